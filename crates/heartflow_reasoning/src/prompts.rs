//! Prompt assembly. The bot talks in Chinese group chats, so prompts are Chinese.

use heartflow_core::{EmotionLabel, Stance};
use regex::Regex;
use std::sync::LazyLock;

static STANCE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"支持|中立|反对").unwrap());
static EMOTION_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"开心|愤怒|悲伤|惊讶|害羞|平静|恐惧|厌恶|困惑").unwrap()
});

/// What the sub-mind knows when it thinks.
#[derive(Debug, Clone, Copy)]
pub struct MindContext<'a> {
    pub schedule: &'a str,
    pub personality: &'a str,
    pub current_mind: &'a str,
    pub talking_summary: &'a str,
    pub mood: &'a str,
}

/// Inputs of the reply generation prompt.
#[derive(Debug, Clone, Copy)]
pub struct ReplyPrompt<'a> {
    pub personality: &'a str,
    pub mood: &'a str,
    /// Current monologue; `None` when the reflection loop is disabled.
    pub current_mind: Option<&'a str>,
    pub relationship_info: &'a str,
    pub recent_excerpt: &'a str,
    pub chat_place: &'a str,
    pub sender_name: &'a str,
    pub message: &'a str,
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// Periodic monologue update.
    pub fn thinking(ctx: &MindContext<'_>, memories: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!("你刚刚在做的事情是：{}\n", ctx.schedule));
        prompt.push_str(&format!("{}\n", ctx.personality));
        if !memories.is_empty() {
            prompt.push_str(&format!(
                "你想起来你之前见过的回忆：{}。\n以上是你的回忆，不一定是目前聊天里的人说的，也不一定是现在发生的事情，请记住。\n",
                memories
            ));
        }
        prompt.push_str(&format!("刚刚你的想法是{}。\n", ctx.current_mind));
        prompt.push_str("-----------------------------------\n");
        if !ctx.talking_summary.is_empty() {
            prompt.push_str(&format!(
                "现在你正在上网，和网友们聊天，大家正在聊的话题是：{}\n",
                ctx.talking_summary
            ));
        }
        prompt.push_str(&format!("你现在{}。\n", ctx.mood));
        prompt.push_str("现在你接下去继续思考，产生新的想法，不要分点输出，输出连贯的内心独白，不要太长，");
        prompt.push_str("但是记得结合上述的消息，要记得维持住你的人设，关注聊天和新内容，不要思考太多:");
        prompt
    }

    /// Monologue update right after the bot sent a reply.
    pub fn after_reply(ctx: &MindContext<'_>, new_messages: &str, reply: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!("你刚刚在做的事情是：{}\n", ctx.schedule));
        prompt.push_str(&format!("{}\n", ctx.personality));
        prompt.push_str(&format!(
            "现在你正在上网，和网友们聊天，大家正在聊的话题是：{}\n",
            ctx.talking_summary
        ));
        prompt.push_str(&format!("刚刚你的想法是{}。", ctx.current_mind));
        prompt.push_str(&format!("你现在看到了网友们发的新消息:{}\n", new_messages));
        prompt.push_str(&format!("你刚刚回复了网友们:{}\n", reply));
        prompt.push_str(&format!("你现在{}。", ctx.mood));
        prompt.push_str("现在你接下去继续思考，产生新的想法，记得保留你刚刚的想法，不要分点输出，输出连贯的内心独白，");
        prompt.push_str("不要太长，但是记得结合上述的消息，要记得你的人设，关注聊天和新内容，关注你回复的内容，不要思考太多:");
        prompt
    }

    /// Ask for a 1-10 desire to speak wrapped in angle brackets.
    pub fn willing(personality: &str, current_mind: &str, mood: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!("{}\n", personality));
        prompt.push_str("现在你正在上网，和网友们聊天。");
        prompt.push_str(&format!("你现在的想法是{}。", current_mind));
        prompt.push_str(&format!("你现在{}。", mood));
        prompt.push_str("现在请你思考，你想不想发言或者回复，请你输出一个数字，1-10，1表示非常不想，10表示非常想。");
        prompt.push_str("请你用<>包裹你的回复意愿，输出<1>表示不想回复，输出<10>表示非常想回复。请你考虑，你完全可以不回复");
        prompt
    }

    pub fn reply(ctx: &ReplyPrompt<'_>) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!("{}\n", ctx.personality));
        prompt.push_str(&format!("你现在{}。\n", ctx.mood));
        if let Some(mind) = ctx.current_mind {
            prompt.push_str(&format!("你现在的想法是：{}\n", mind));
        }
        if !ctx.relationship_info.is_empty() {
            prompt.push_str(&format!("{}\n", ctx.relationship_info));
        }
        if !ctx.recent_excerpt.is_empty() {
            prompt.push_str(&format!("以下是{}里最近的聊天记录：\n{}\n", ctx.chat_place, ctx.recent_excerpt));
        }
        prompt.push_str(&format!("现在'{}'说：{}\n", ctx.sender_name, ctx.message));
        prompt.push_str("请你结合聊天记录和你的想法，给出日常且口语化的回复，尽量简短一些，不要刻意突出自身学科背景，");
        prompt.push_str("不要浮夸，不要用夸张修辞，平淡一些。不要输出多余内容(包括前后缀，冒号和引号，括号，表情等)，只输出回复内容。");
        prompt
    }

    /// Classify the bot's own reply as "立场-情感".
    pub fn emotion_tags(reply: &str, incoming: &str) -> String {
        let stances = [Stance::Supportive, Stance::Neutral, Stance::Opposed]
            .iter()
            .map(|s| s.as_zh())
            .collect::<Vec<_>>()
            .join("，");
        let emotions = EmotionLabel::ALL
            .iter()
            .map(|e| e.as_zh())
            .collect::<Vec<_>>()
            .join("，");
        format!(
            "有人说：{}\n你回复了：{}\n请判断你的回复对对方所说内容的立场，从[{}]中选择一个；\
             再判断你回复时的情感，从[{}]中选择一个。\
             只输出\"立场-情感\"，例如\"中立-平静\"，不要输出其他内容。",
            incoming, reply, stances, emotions
        )
    }
}

/// Parse "立场-情感" output. Missing parts fall back to neutral and calm.
pub fn parse_emotion_tags(text: &str) -> (Stance, EmotionLabel) {
    let stance = STANCE_WORD
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(Stance::Neutral);
    let emotion = EMOTION_WORD
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(EmotionLabel::Calm);
    (stance, emotion)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(summary: &'a str) -> MindContext<'a> {
        MindContext {
            schedule: "在宿舍打游戏",
            personality: "你是麦麦，是一个大二女大学生",
            current_mind: "你什么也没想",
            talking_summary: summary,
            mood: "心情平静",
        }
    }

    #[test]
    fn test_thinking_prompt_skips_empty_sections() {
        let prompt = PromptBuilder::thinking(&ctx(""), "");
        assert!(prompt.contains("在宿舍打游戏"));
        assert!(prompt.contains("刚刚你的想法是你什么也没想"));
        assert!(!prompt.contains("回忆"));
        assert!(!prompt.contains("话题是"));

        let prompt = PromptBuilder::thinking(&ctx("期末考试"), "上次一起复习");
        assert!(prompt.contains("上次一起复习"));
        assert!(prompt.contains("期末考试"));
    }

    #[test]
    fn test_after_reply_prompt_includes_reply() {
        let prompt = PromptBuilder::after_reply(&ctx("游戏"), "小明: 上号", "马上来");
        assert!(prompt.contains("小明: 上号"));
        assert!(prompt.contains("马上来"));
    }

    #[test]
    fn test_willing_prompt_asks_for_brackets() {
        let prompt = PromptBuilder::willing("你是麦麦", "想睡觉", "有点困");
        assert!(prompt.contains("<10>"));
        assert!(prompt.contains("想睡觉"));
    }

    #[test]
    fn test_parse_emotion_tags() {
        assert_eq!(parse_emotion_tags("支持-开心"), (Stance::Supportive, EmotionLabel::Joy));
        assert_eq!(parse_emotion_tags("立场：反对，情感：愤怒"), (Stance::Opposed, EmotionLabel::Anger));
        assert_eq!(parse_emotion_tags("害羞"), (Stance::Neutral, EmotionLabel::Shyness));
        assert_eq!(parse_emotion_tags("???"), (Stance::Neutral, EmotionLabel::Calm));
    }
}

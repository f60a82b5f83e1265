//! Inbound message handling: decide whether to reply, generate, and feed
//! the outcome back into the reflection loop, relationships and mood.

use crate::heartflow::Heartflow;
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::{parse_emotion_tags, PromptBuilder, ReplyPrompt};
use crate::submind::{MindServices, SubMind};
use anyhow::Result;
use heartflow_core::{
    ConversationObserver, ConversationStream, EmotionLabel, HeartflowConfig, InboundMessage,
    InterestScorer, MemoryRetrieval, MessageSet, MoodSource, OutboundDispatch, Personality,
    ScheduleSource, Stance, StreamRegistry, ThinkingPlaceholder,
};
use heartflow_expression::{Fulfillment, Humanizer, ThinkingLifecycle};
use heartflow_limbic::{is_mentioned_bot, ReplyContext, WillingManager};
use heartflow_memory::RelationshipManager;
use std::sync::Arc;

/// Temperature for the emotion tagging call; it should be boring.
const TAGGING_TEMPERATURE: f32 = 0.3;

/// Everything the pipeline talks to.
#[derive(Clone)]
pub struct ChatServices {
    pub llm: Arc<dyn LlmClient>,
    pub memory: Arc<dyn MemoryRetrieval>,
    pub interest: Arc<dyn InterestScorer>,
    pub mood: Arc<dyn MoodSource>,
    pub observer: Arc<dyn ConversationObserver>,
    pub schedule: Arc<dyn ScheduleSource>,
    pub outbound: Arc<dyn OutboundDispatch>,
    pub willing: Arc<WillingManager>,
    pub relationships: Arc<RelationshipManager>,
}

impl ChatServices {
    fn mind_services(&self) -> MindServices {
        MindServices {
            llm: self.llm.clone(),
            memory: self.memory.clone(),
            mood: self.mood.clone(),
            observer: self.observer.clone(),
            schedule: self.schedule.clone(),
        }
    }
}

/// The path a message took through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Engagement {
    /// The dice said no.
    Ignored { probability: f64 },
    /// Inference failed or produced nothing; the placeholder was withdrawn.
    NoContent { probability: f64 },
    /// The placeholder vanished before the reply was ready.
    Abandoned { probability: f64 },
    Replied {
        probability: f64,
        reply: MessageSet,
        tags: Option<(Stance, EmotionLabel)>,
        relationship_delta: Option<f64>,
    },
}

impl Engagement {
    pub fn probability(&self) -> f64 {
        match self {
            Engagement::Ignored { probability }
            | Engagement::NoContent { probability }
            | Engagement::Abandoned { probability }
            | Engagement::Replied { probability, .. } => *probability,
        }
    }
}

type Dice = Box<dyn Fn() -> f64 + Send + Sync>;

pub struct ChatBot {
    config: HeartflowConfig,
    personality: Personality,
    params: CompletionParams,
    services: ChatServices,
    streams: StreamRegistry,
    heartflow: Option<Arc<Heartflow>>,
    lifecycle: ThinkingLifecycle,
    humanizer: Humanizer,
    dice: Dice,
}

impl ChatBot {
    pub fn new(config: HeartflowConfig, services: ChatServices) -> Self {
        let personality = Personality::from_config(&config.bot);
        let params = CompletionParams::from_config(&config.llm);
        let heartflow = config.enable_think_flow.then(|| {
            Arc::new(Heartflow::new(
                personality.clone(),
                config.reflection.clone(),
                params,
                services.mind_services(),
            ))
        });
        Self {
            lifecycle: ThinkingLifecycle::new(services.outbound.clone()),
            humanizer: Humanizer::with_max_chunk_chars(config.outbound.max_segment_chars),
            config,
            personality,
            params,
            services,
            streams: StreamRegistry::new(),
            heartflow,
            dice: Box::new(rand::random::<f64>),
        }
    }

    /// Replace the random roll, e.g. with a constant in tests.
    pub fn with_dice(mut self, dice: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        self.dice = Box::new(dice);
        self
    }

    pub fn heartflow(&self) -> Option<&Arc<Heartflow>> {
        self.heartflow.as_ref()
    }

    pub fn streams(&self) -> &StreamRegistry {
        &self.streams
    }

    /// Handle one inbound message. Only an invalid sender identity is an error.
    #[tracing::instrument(skip(self, message), fields(stream = %message.stream_id()))]
    pub async fn process_message(&self, message: InboundMessage) -> Result<Engagement> {
        message.user_info.validate()?;
        let stream = self
            .streams
            .get_or_create(&message.platform, &message.user_info, message.group_info.as_ref())
            .await?;

        let mind = match &self.heartflow {
            Some(hf) => Some(hf.create_submind(&stream.stream_id).await),
            None => None,
        };

        self.services.relationships.ensure(&message.user_info).await?;

        let interest = match self.services.interest.score_relevance(&message.plain_text).await {
            Ok(rate) => rate.max(0.0),
            Err(e) => {
                tracing::warn!("Interest scoring failed: {:#}", e);
                0.0
            }
        };
        let is_mentioned = is_mentioned_bot(&message, &self.config.bot);
        let rating = match &mind {
            Some(mind) => Some(mind.reflection_rating().await),
            None => None,
        };

        let reading = self
            .services
            .willing
            .compute_reply_probability(&ReplyContext {
                stream_id: &stream.stream_id,
                is_mentioned,
                is_emoji: message.is_emoji,
                interest_rate: interest,
                sender_id: &message.user_info.user_id,
                reflection_rating: rating,
            })
            .await;
        let probability = (reading.probability + message.probability_gain.unwrap_or(0.0)).clamp(0.0, 1.0);

        tracing::info!(
            "[{}][{}]{}: {} [willing: {:.2}][probability: {:.1}%]",
            chrono::DateTime::from_timestamp(message.timestamp, 0)
                .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
                .unwrap_or_default(),
            stream.display_name(),
            message.user_info.nickname,
            message.plain_text,
            reading.blended,
            probability * 100.0
        );

        if (self.dice)() >= probability {
            return Ok(Engagement::Ignored { probability });
        }

        let placeholder = self.lifecycle.begin(&message).await;
        self.services
            .willing
            .change_reply_willing_sent(&stream.stream_id, &message.user_info.user_id)
            .await;

        let Some(text) = self.generate_reply(&message, &stream, mind.as_deref()).await else {
            self.lifecycle.discard(&placeholder).await;
            return Ok(Engagement::NoContent { probability });
        };

        let segments = self.humanizer.split_response(&text);
        let reply = match self.lifecycle.fulfill(&placeholder, segments).await {
            Fulfillment::Fulfilled(set) => set,
            Fulfillment::Abandoned => return Ok(Engagement::Abandoned { probability }),
            Fulfillment::Discarded => return Ok(Engagement::NoContent { probability }),
        };
        tracing::info!("Reply to {}: {}", message.user_info.nickname, reply.text());

        if let Some(mind) = &mind {
            let excerpt = self
                .services
                .observer
                .recent_excerpt(&stream.stream_id, self.config.bot.max_context_size)
                .await;
            mind.do_after_reply(&reply.text(), &excerpt).await;
        }

        let (tags, relationship_delta) = self.update_emotion_and_relationship(&message, &placeholder, &reply).await;

        Ok(Engagement::Replied {
            probability,
            reply,
            tags,
            relationship_delta,
        })
    }

    async fn generate_reply(
        &self,
        message: &InboundMessage,
        stream: &ConversationStream,
        mind: Option<&SubMind>,
    ) -> Option<String> {
        let current_mind = match mind {
            Some(mind) => Some(mind.current_mind().await),
            None => None,
        };
        let relationship_info = self
            .services
            .relationships
            .build_relationship_info(&message.user_info)
            .await;
        let sender_name = self.services.relationships.get_name(&message.user_info).await;
        let recent_excerpt = self
            .services
            .observer
            .recent_excerpt(&stream.stream_id, self.config.bot.max_context_size)
            .await;
        let mood = self.services.mood.current_mood_summary();
        let personality = self.personality.prompt_fragment();
        let chat_place = stream.display_name();

        let prompt = PromptBuilder::reply(&ReplyPrompt {
            personality: &personality,
            mood: &mood,
            current_mind: current_mind.as_deref(),
            relationship_info: &relationship_info,
            recent_excerpt: &recent_excerpt,
            chat_place: &chat_place,
            sender_name: &sender_name,
            message: &message.plain_text,
        });
        tracing::debug!("Reply prompt:\n{}", prompt);

        match self.services.llm.generate(&prompt, self.params).await {
            Ok(generation) if !generation.is_empty() => Some(generation.text),
            Ok(_) => {
                tracing::info!("Reply generation returned nothing");
                None
            }
            Err(e) => {
                tracing::warn!("Reply generation failed: {:#}", e);
                None
            }
        }
    }

    async fn update_emotion_and_relationship(
        &self,
        message: &InboundMessage,
        placeholder: &ThinkingPlaceholder,
        reply: &MessageSet,
    ) -> (Option<(Stance, EmotionLabel)>, Option<f64>) {
        let prompt = PromptBuilder::emotion_tags(&reply.text(), &message.plain_text);
        let params = self.params.with_temperature(TAGGING_TEMPERATURE);
        let (stance, emotion) = match self.services.llm.generate(&prompt, params).await {
            Ok(generation) => parse_emotion_tags(&generation.text),
            Err(e) => {
                tracing::warn!("Emotion tagging for {} failed: {:#}", placeholder.id, e);
                return (None, None);
            }
        };
        tracing::debug!("Reply {} tagged {}-{}", placeholder.id, stance, emotion);

        let delta = match self
            .services
            .relationships
            .calculate_update_relationship_value(&message.user_info, emotion, stance)
            .await
        {
            Ok(delta) => delta,
            Err(e) => {
                tracing::warn!("Relationship update failed: {:#}", e);
                None
            }
        };
        self.services
            .mood
            .update_from_emotion(emotion, self.config.relationship.mood_intensity_factor);

        (Some((stance, emotion)), delta)
    }
}

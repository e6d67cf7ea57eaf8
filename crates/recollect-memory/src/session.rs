//! Per-session context object wiring history, search, profile, tools, and
//! long-term memory around one chat.

use crate::error::MemoryError;
use crate::history::{ConversationHistoryTracker, SummaryUpdate, TurnReport};
use crate::persistence::PersistenceGateway;
use crate::policy::{HistoryPolicy, SearchPolicy};
use crate::prompt::{FunctionResult, PromptBuilder, PromptMode, compose_request};
use crate::search::{HistorySearchIndex, SearchResult};
use crate::tiered::{ConsolidationReport, MemorySession, UserProfile};
use crate::tools::{MemoryTools, follow_up_prompt, parse_function_call};
use crate::users::UserDirectory;
use log::{debug, info, warn};
use recollect_protocol::{CallOutcome, GenerationGateway, Role, SessionContext};
use std::sync::Arc;

/// Reply used when the model keeps requesting functions past the limit.
pub const CALL_LIMIT_MESSAGE: &str =
    "I've reached the maximum number of function calls for this conversation.";

const NO_PROFILE: &str = "No user information available.";

/// Settings for one chat session.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub mode: PromptMode,
    pub chat_model: String,
    pub max_function_calls: usize,
    /// Results per tier when recalling long-term memory into the prompt.
    pub memory_context_limit: usize,
    pub history: HistoryPolicy,
    pub search: SearchPolicy,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            mode: PromptMode::Basic,
            chat_model: "gemini-2.0-flash".to_string(),
            max_function_calls: 3,
            memory_context_limit: 3,
            history: HistoryPolicy::default(),
            search: SearchPolicy::default(),
        }
    }
}

/// The assistant's answer to one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    /// Functions executed while producing the answer, in call order.
    pub function_calls: Vec<FunctionResult>,
}

/// What recording a finished exchange did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTurn {
    pub turn: TurnReport,
    pub summary: SummaryUpdate,
    /// Working memories written for the exchange.
    pub remembered: usize,
}

/// Everything one conversation needs, built once per session.
pub struct ChatSession {
    settings: ChatSettings,
    generation: Arc<dyn GenerationGateway>,
    tracker: ConversationHistoryTracker,
    search: Arc<HistorySearchIndex>,
    users: UserDirectory,
    tools: MemoryTools,
    memory: Option<MemorySession>,
}

impl ChatSession {
    pub fn new(
        context: SessionContext,
        settings: ChatSettings,
        persistence: Arc<dyn PersistenceGateway>,
        generation: Arc<dyn GenerationGateway>,
        memory: Option<MemorySession>,
    ) -> Self {
        let tracker = ConversationHistoryTracker::new(
            context,
            settings.history.clone(),
            persistence.clone(),
            generation.clone(),
        );
        let search = Arc::new(HistorySearchIndex::new(
            persistence.clone(),
            generation.clone(),
            settings.search.clone(),
        ));
        let users = UserDirectory::new(persistence);
        let tools = MemoryTools::new(search.clone(), users.clone());
        Self {
            settings,
            generation,
            tracker,
            search,
            users,
            tools,
            memory,
        }
    }

    pub fn context(&self) -> &SessionContext {
        self.tracker.context()
    }

    pub fn tracker(&self) -> &ConversationHistoryTracker {
        &self.tracker
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn memory(&self) -> Option<&MemorySession> {
        self.memory.as_ref()
    }

    /// Keyword search over everything persisted so far.
    pub fn search(&self, term: &str) -> CallOutcome<SearchResult> {
        self.search.search(term)
    }

    /// System prompt for a turn answering `query`.
    pub fn system_prompt(&self, query: &str, function_results: &[FunctionResult]) -> String {
        let profile = match self.users.user_info() {
            Ok(Some(user)) if !user.fields.is_empty() => user.describe(),
            Ok(_) => NO_PROFILE.to_string(),
            Err(err) => {
                warn!("failed to load user profile (error={err})");
                NO_PROFILE.to_string()
            }
        };
        let memory_context = self
            .memory
            .as_ref()
            .map(|memory| memory.get_relevant_context(query, self.settings.memory_context_limit))
            .unwrap_or_default();
        PromptBuilder::new(self.settings.mode)
            .user_profile(profile)
            .summary(self.tracker.latest_summary())
            .recent(self.tracker.rolling_history())
            .memory_context(memory_context)
            .function_results(function_results)
            .build()
    }

    /// Ask the chat model to answer `message`.
    ///
    /// In agentic mode the model may request functions; each request is
    /// executed and its result fed back until the model answers in prose or
    /// the call limit is reached.
    pub fn respond(&self, message: &str) -> Result<ChatReply, MemoryError> {
        let mut function_calls: Vec<FunctionResult> = Vec::new();
        let mut request = message.to_string();
        loop {
            if self.settings.mode == PromptMode::Agentic
                && function_calls.len() >= self.settings.max_function_calls
            {
                info!(
                    "function call limit reached (limit={})",
                    self.settings.max_function_calls
                );
                return Ok(ChatReply {
                    text: CALL_LIMIT_MESSAGE.to_string(),
                    function_calls,
                });
            }
            let system_prompt = self.system_prompt(message, &function_calls);
            let response = self.generation.generate(
                &self.settings.chat_model,
                &compose_request(&system_prompt, &request),
            )?;
            let call = match self.settings.mode {
                PromptMode::Agentic => parse_function_call(&response),
                PromptMode::Basic => None,
            };
            let Some(call) = call else {
                return Ok(ChatReply {
                    text: response.trim().to_string(),
                    function_calls,
                });
            };
            let outcome = self.tools.execute(&call);
            debug!(
                "function executed (name={}, calls={})",
                call.function,
                function_calls.len() + 1
            );
            request = follow_up_prompt(&call, &outcome);
            function_calls.push(FunctionResult {
                function: call.function,
                result: outcome,
            });
        }
    }

    /// Store a finished exchange: rolling window, durable history, summary
    /// cadence, and working memory.
    pub fn record(&mut self, message: &str, reply: &str) -> RecordedTurn {
        let pairs = self.settings.history.max_history_pairs;
        let turn = self.tracker.add_turn(message, reply, pairs);
        let summary = self.tracker.update_chat_summary(pairs);
        let user_id = self
            .context()
            .user_id
            .map_or_else(|| "default".to_string(), |id| id.to_string());
        let remembered = self.memory.as_ref().map_or(0, |memory| {
            [(Role::User, message), (Role::Assistant, reply)]
                .into_iter()
                .filter_map(|(role, content)| memory.process_message(role, content, &user_id))
                .count()
        });
        RecordedTurn {
            turn,
            summary,
            remembered,
        }
    }

    /// Answer `message` and record the exchange.
    pub fn turn(&mut self, message: &str) -> Result<(ChatReply, RecordedTurn), MemoryError> {
        let reply = self.respond(message)?;
        let recorded = self.record(message, &reply.text);
        Ok((reply, recorded))
    }

    /// What long-term memory knows about the current user.
    pub fn user_profile(&self) -> Option<UserProfile> {
        let memory = self.memory.as_ref()?;
        let user_id = self
            .context()
            .user_id
            .map_or_else(|| "default".to_string(), |id| id.to_string());
        Some(memory.get_user_profile(&user_id))
    }

    /// Consolidate working memories; `None` when long-term memory is off.
    pub fn end_session(&mut self) -> Option<ConsolidationReport> {
        self.memory.as_mut().map(MemorySession::end_session)
    }
}

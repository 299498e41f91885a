use crate::commands::{AlertArgs, Command, CommandError};
use crate::messages;
use crate::search::RangeSearchEngine;
use crate::telegram::TelegramClient;
use chrono::NaiveDate;
use skyfare_core::alert::{parse_future_date, AlertId, ValidationError};
use skyfare_core::search::rank_cheapest;
use skyfare_core::{
    today, AirportCode, AlertRepository, CoreError, NewAlert, NotificationSink, OwnerId,
    RangeSearchRequest,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct BotSettings {
    pub result_limit: usize,
    pub currency: String,
    pub link_base_url: String,
    /// An unanswered `/search` dialogue is dropped after this long.
    pub dialogue_ttl: Duration,
}

/// Progress of a `/search` dialogue for one chat.
#[derive(Debug, Clone)]
enum SearchDialogue {
    Origin,
    Destination {
        origin: AirportCode,
    },
    StartDate {
        origin: AirportCode,
        destination: AirportCode,
    },
    EndDate {
        origin: AirportCode,
        destination: AirportCode,
        start_date: NaiveDate,
    },
    Passengers {
        origin: AirportCode,
        destination: AirportCode,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
}

struct OpenDialogue {
    step: SearchDialogue,
    touched: Instant,
}

enum Step {
    Next(SearchDialogue, &'static str),
    Retry(String),
    Done(RangeSearchRequest),
}

impl SearchDialogue {
    fn advance(self, input: &str, today: NaiveDate) -> Step {
        let result = match self {
            SearchDialogue::Origin => AirportCode::parse(input).map(|origin| {
                Step::Next(
                    SearchDialogue::Destination { origin },
                    "Enter the destination airport code (e.g. LED):",
                )
            }),
            SearchDialogue::Destination { origin } => {
                AirportCode::parse(input).map(|destination| {
                    Step::Next(
                        SearchDialogue::StartDate { origin, destination },
                        "Enter the first departure date (YYYY-MM-DD):",
                    )
                })
            }
            SearchDialogue::StartDate { origin, destination } => {
                parse_future_date(input, today).map(|start_date| {
                    Step::Next(
                        SearchDialogue::EndDate {
                            origin,
                            destination,
                            start_date,
                        },
                        "Enter the last departure date (YYYY-MM-DD):",
                    )
                })
            }
            SearchDialogue::EndDate {
                origin,
                destination,
                start_date,
            } => parse_future_date(input, today).and_then(|end_date| {
                if end_date < start_date {
                    return Err(ValidationError::InvertedRange {
                        start: start_date,
                        end: end_date,
                    });
                }
                Ok(Step::Next(
                    SearchDialogue::Passengers {
                        origin,
                        destination,
                        start_date,
                        end_date,
                    },
                    "How many adult passengers?",
                ))
            }),
            SearchDialogue::Passengers {
                origin,
                destination,
                start_date,
                end_date,
            } => parse_passengers(input).map(|passengers| {
                Step::Done(RangeSearchRequest {
                    origin,
                    destination,
                    start_date,
                    end_date,
                    passengers,
                })
            }),
        };

        result.unwrap_or_else(|err| Step::Retry(format!("❌ {err}. Please try again.")))
    }
}

fn parse_passengers(input: &str) -> Result<u32, ValidationError> {
    let count = crate::commands::parse_number(input)?;
    u32::try_from(count)
        .ok()
        .filter(|count| *count >= 1)
        .ok_or(ValidationError::InvalidPassengers(count))
}

/// Handles chat input: commands, the search dialogue and alert management.
pub struct BotService {
    repo: Arc<dyn AlertRepository>,
    search: RangeSearchEngine,
    sink: Arc<dyn NotificationSink>,
    settings: BotSettings,
    dialogues: Mutex<HashMap<OwnerId, OpenDialogue>>,
}

impl BotService {
    pub fn new(
        repo: Arc<dyn AlertRepository>,
        search: RangeSearchEngine,
        sink: Arc<dyn NotificationSink>,
        settings: BotSettings,
    ) -> Self {
        Self {
            repo,
            search,
            sink,
            settings,
            dialogues: Mutex::new(HashMap::new()),
        }
    }

    pub async fn handle_message(&self, chat_id: OwnerId, text: &str) {
        match Command::parse(text) {
            Some(Ok(command)) => self.handle_command(chat_id, command).await,
            Some(Err(CommandError::Unknown(_))) => {
                self.reply(chat_id, messages::UNKNOWN_INPUT).await
            }
            Some(Err(CommandError::BadArguments { command: "cancel", .. })) => {
                self.reply(chat_id, messages::CANCEL_USAGE).await
            }
            Some(Err(CommandError::BadArguments { reason, .. })) => {
                self.reply(chat_id, &messages::alert_usage_error(&reason.to_string()))
                    .await
            }
            None => self.continue_dialogue(chat_id, text).await,
        }
    }

    async fn handle_command(&self, chat_id: OwnerId, command: Command) {
        match command {
            Command::Start | Command::Help => {
                self.prune_dialogues().await;
                self.reply(chat_id, &messages::help_text()).await
            }
            Command::Search => {
                self.prune_dialogues().await;
                self.dialogues.lock().await.insert(
                    chat_id,
                    OpenDialogue {
                        step: SearchDialogue::Origin,
                        touched: Instant::now(),
                    },
                );
                self.reply(chat_id, "Enter the origin airport code (e.g. MOW):")
                    .await;
            }
            Command::Stop => {
                self.dialogues.lock().await.remove(&chat_id);
                self.reply(chat_id, messages::SEARCH_STOPPED).await;
            }
            Command::Alert(args) => self.create_alert(chat_id, args).await,
            Command::Alerts => self.list_alerts(chat_id).await,
            Command::Cancel(id) => self.cancel_alert(chat_id, id).await,
        }
    }

    /// Number of `/search` dialogues currently held in memory.
    pub async fn open_dialogues(&self) -> usize {
        self.dialogues.lock().await.len()
    }

    async fn prune_dialogues(&self) {
        let ttl = self.settings.dialogue_ttl;
        let mut dialogues = self.dialogues.lock().await;
        let before = dialogues.len();
        dialogues.retain(|_, open| open.touched.elapsed() < ttl);
        let pruned = before - dialogues.len();
        if pruned > 0 {
            debug!(pruned, "Dropped stale search dialogues");
        }
    }

    async fn continue_dialogue(&self, chat_id: OwnerId, text: &str) {
        let step = {
            let mut dialogues = self.dialogues.lock().await;
            dialogues
                .remove(&chat_id)
                .filter(|open| open.touched.elapsed() < self.settings.dialogue_ttl)
                .map(|open| {
                    let step = open.step.clone().advance(text, today());
                    let keep = match &step {
                        Step::Next(next, _) => Some(next.clone()),
                        Step::Retry(_) => Some(open.step),
                        Step::Done(_) => None,
                    };
                    if let Some(step) = keep {
                        dialogues.insert(
                            chat_id,
                            OpenDialogue {
                                step,
                                touched: Instant::now(),
                            },
                        );
                    }
                    step
                })
        };

        match step {
            Some(Step::Next(_, prompt)) => self.reply(chat_id, prompt).await,
            Some(Step::Retry(message)) => self.reply(chat_id, &message).await,
            Some(Step::Done(request)) => self.run_search(chat_id, request).await,
            None => self.reply(chat_id, messages::UNKNOWN_INPUT).await,
        }
    }

    async fn run_search(&self, chat_id: OwnerId, request: RangeSearchRequest) {
        self.reply(chat_id, messages::SEARCH_STARTED).await;
        info!(
            chat_id,
            origin = %request.origin,
            destination = %request.destination,
            start = %request.start_date,
            end = %request.end_date,
            "Interactive search"
        );

        let quotes = self.search.search_range(&request).await;
        let best = rank_cheapest(quotes, self.settings.result_limit);
        if best.is_empty() {
            self.reply(chat_id, messages::NO_RESULTS).await;
            return;
        }
        for quote in &best {
            let text = messages::fare_line(quote, &self.settings.currency, &self.settings.link_base_url);
            self.reply(chat_id, &text).await;
        }
    }

    async fn create_alert(&self, chat_id: OwnerId, args: AlertArgs) {
        let alert = NewAlert {
            owner_id: chat_id,
            origin: args.origin,
            destination: args.destination,
            start_date: args.start_date,
            end_date: args.end_date,
            passengers: args.passengers,
            threshold_price: args.threshold_price,
        };

        match self.repo.create(alert).await {
            Ok(created) => {
                self.reply(chat_id, &messages::alert_created(&created, &self.settings.currency))
                    .await
            }
            Err(CoreError::Validation(err)) => {
                self.reply(chat_id, &messages::alert_usage_error(&err.to_string()))
                    .await
            }
            Err(err) => {
                error!(chat_id, error = %err, "Failed to create alert");
                self.reply(chat_id, messages::STORAGE_FAILURE).await;
            }
        }
    }

    async fn list_alerts(&self, chat_id: OwnerId) {
        match self.repo.list_by_owner(chat_id).await {
            Ok(alerts) => {
                self.reply(chat_id, &messages::alert_list(&alerts, &self.settings.currency))
                    .await
            }
            Err(err) => {
                error!(chat_id, error = %err, "Failed to list alerts");
                self.reply(chat_id, messages::STORAGE_FAILURE).await;
            }
        }
    }

    async fn cancel_alert(&self, chat_id: OwnerId, id: AlertId) {
        let result = async {
            let owned = self
                .repo
                .list_by_owner(chat_id)
                .await?
                .into_iter()
                .find(|alert| alert.id == id);
            let removed = self.repo.delete_by_owner(id, chat_id).await?;
            Ok::<_, CoreError>(owned.filter(|_| removed))
        }
        .await;

        match result {
            Ok(Some(alert)) => self.reply(chat_id, &messages::alert_deleted(&alert)).await,
            Ok(None) => self.reply(chat_id, messages::ALERT_NOT_FOUND).await,
            Err(err) => {
                error!(chat_id, alert_id = id, error = %err, "Failed to delete alert");
                self.reply(chat_id, messages::STORAGE_FAILURE).await;
            }
        }
    }

    async fn reply(&self, chat_id: OwnerId, text: &str) {
        if let Err(err) = self.sink.send_message(chat_id, text).await {
            warn!(chat_id, error = %err, "Reply not delivered");
        }
    }
}

struct ChatWorker {
    queue: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

/// Hands messages to `BotService` on one worker task per chat, so chats
/// run concurrently while each chat's messages are handled one at a time in
/// arrival order. A worker left idle for `idle_timeout` exits.
pub struct ChatDispatcher {
    service: Arc<BotService>,
    idle_timeout: Duration,
    workers: HashMap<OwnerId, ChatWorker>,
}

impl ChatDispatcher {
    pub fn new(service: Arc<BotService>, idle_timeout: Duration) -> Self {
        Self {
            service,
            idle_timeout,
            workers: HashMap::new(),
        }
    }

    pub fn dispatch(&mut self, chat_id: OwnerId, text: String) {
        self.workers.retain(|_, worker| !worker.task.is_finished());

        let (text, previous) = match self.workers.remove(&chat_id) {
            Some(worker) => match worker.queue.send(text) {
                Ok(()) => {
                    self.workers.insert(chat_id, worker);
                    return;
                }
                // The worker is winding down; its successor waits for it.
                Err(mpsc::error::SendError(text)) => (text, Some(worker.task)),
            },
            None => (text, None),
        };

        let worker = self.spawn_worker(chat_id, previous);
        if worker.queue.send(text).is_err() {
            warn!(chat_id, "Chat worker closed before its first message");
        }
        self.workers.insert(chat_id, worker);
    }

    /// Chats with a live worker.
    pub fn active_chats(&self) -> usize {
        self.workers
            .values()
            .filter(|worker| !worker.task.is_finished())
            .count()
    }

    /// Stops accepting messages and waits until every queued one is handled.
    pub async fn close(self) {
        for (chat_id, worker) in self.workers {
            drop(worker.queue);
            if let Err(e) = worker.task.await {
                error!(chat_id, "Chat worker ended abnormally: {}", e);
            }
        }
    }

    fn spawn_worker(&self, chat_id: OwnerId, previous: Option<JoinHandle<()>>) -> ChatWorker {
        let (queue, mut inbox) = mpsc::unbounded_channel::<String>();
        let service = self.service.clone();
        let idle_timeout = self.idle_timeout;

        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            loop {
                match tokio::time::timeout(idle_timeout, inbox.recv()).await {
                    Ok(Some(text)) => service.handle_message(chat_id, &text).await,
                    Ok(None) => break,
                    Err(_) => {
                        inbox.close();
                        while let Ok(text) = inbox.try_recv() {
                            service.handle_message(chat_id, &text).await;
                        }
                        debug!(chat_id, "Chat worker idle, exiting");
                        break;
                    }
                }
            }
        });

        ChatWorker { queue, task }
    }
}

/// Polls the Bot API and feeds each text message to `dispatcher`, so a long
/// range search never holds up other chats.
pub async fn run_bot(
    telegram: Arc<TelegramClient>,
    mut dispatcher: ChatDispatcher,
    poll_timeout_secs: u64,
    cancel: CancellationToken,
) {
    info!("Bot polling started");
    let mut offset = 0;

    loop {
        let updates = tokio::select! {
            result = telegram.get_updates(offset, poll_timeout_secs) => result,
            _ = cancel.cancelled() => break,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(err) => {
                warn!(error = %err, "Polling for updates failed");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(5)) => continue,
                    _ = cancel.cancelled() => break,
                }
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else { continue };
            let Some(text) = message.text else { continue };
            dispatcher.dispatch(message.chat.id, text);
        }
    }

    info!(active_chats = dispatcher.active_chats(), "Bot polling stopped");
}

//! The client façade.
//!
//! [`Client`] is a cheap, cloneable handle. Commands go through the response
//! cache and then onto the worker pool's queue; each is bounded by an overall
//! deadline on top of the per-socket ones. Events from the pollers are fanned
//! out by the notifier.

use log::{debug, info, warn};
use rcon_shared::event::*;
use rcon_shared::{Event, EventKind, GameState, Generation, PlayerInfo, Slots, TypedEvent};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::cache::{self, ResponseCache};
use crate::commands::*;
use crate::config::{ClientOptions, ServerConfig};
use crate::error::RconError;
use crate::notifier::{self, Notifier, Subscriber, SubscriberId, EVENT_QUEUE_CAPACITY};
use crate::pipeline::{LogPoller, SnapshotPoller};
use crate::pool::{Job, Lane, WorkerPool};
use crate::transport::{Connection, ReadMode};

struct Inner {
    config: Arc<ServerConfig>,
    options: ClientOptions,
    pool: WorkerPool,
    cache: Arc<ResponseCache>,
    notifier: Arc<Notifier>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

/// Handle held by background tasks. It does not keep the client alive, so
/// dropping the last [`Client`] still shuts everything down.
#[derive(Clone)]
pub(crate) struct WeakClient {
    inner: Weak<Inner>,
}

impl WeakClient {
    pub(crate) fn upgrade(&self) -> Option<Client> {
        self.inner.upgrade().map(|inner| Client { inner })
    }
}

impl Client {
    /// Checks the credentials with one handshake, then starts the worker
    /// pool, the cache sweeper and whichever pollers `options` enables.
    pub async fn connect(config: ServerConfig, options: ClientOptions) -> Result<Self, RconError> {
        let config = Arc::new(config);
        Connection::open(
            config.clone(),
            options.generation,
            options.legacy_preamble,
            ReadMode::Safe,
        )
        .await?;

        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let pool = WorkerPool::start(config.clone(), &options, shutdown.clone(), tracker.clone());

        let cache = Arc::new(ResponseCache::new(options.cache_enabled));
        if options.cache_enabled {
            tracker.spawn(cache::run_sweeper(cache.clone(), shutdown.clone()));
        }

        let client = Client {
            inner: Arc::new(Inner {
                config,
                options,
                pool,
                cache,
                notifier: Arc::new(Notifier::new()),
                shutdown,
                tracker,
            }),
        };
        client.start_pipeline();

        info!(
            "Connected to {} ({}) with {} workers",
            client.inner.config.addr(),
            client.inner.options.generation,
            client.inner.options.workers
        );
        Ok(client)
    }

    fn start_pipeline(&self) {
        let inner = &self.inner;
        let options = &inner.options;
        if options.log_poll.is_none() && options.snapshot_poll.is_none() {
            return;
        }

        let (events, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        inner.tracker.spawn(notifier::run_consumer(
            inner.notifier.clone(),
            rx,
            inner.shutdown.clone(),
        ));

        if let Some(settings) = options.log_poll {
            let poller = LogPoller::new(self.downgrade(), settings, events.clone());
            inner.tracker.spawn(poller.run(inner.shutdown.clone()));
        }
        if let Some(interval) = options.snapshot_poll {
            let poller = SnapshotPoller::new(self.downgrade(), interval, events);
            inner.tracker.spawn(poller.run(inner.shutdown.clone()));
        }
    }

    pub(crate) fn downgrade(&self) -> WeakClient {
        WeakClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn generation(&self) -> Generation {
        self.inner.options.generation
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Runs a typed request, serving it from the cache when its response
    /// type allows.
    pub async fn execute<R: Request>(&self, request: &R) -> Result<R::Response, RconError> {
        self.execute_on(Lane::Shared, request).await
    }

    async fn execute_on<R: Request>(
        &self,
        lane: Lane,
        request: &R,
    ) -> Result<R::Response, RconError> {
        let generation = self.generation();
        let command = request.command(generation)?;
        let ttl = <R::Response as Response>::CACHE_TTL;
        let key = command.cache_key();

        if !ttl.is_zero() {
            if let Some(hit) = self.inner.cache.get::<R::Response>(&key) {
                debug!("Cache hit for `{}`", command.name);
                return Ok(hit);
            }
        }

        let line = command.line();
        let payload = self.dispatch(lane, command).await?;
        let value = R::Response::decode(payload, generation).map_err(|e| match e {
            RconError::Rejected { reply, .. } => RconError::Rejected {
                command: line,
                reply,
            },
            other => other,
        })?;

        if !ttl.is_zero() {
            self.inner.cache.insert(key, value.clone(), ttl);
        }
        Ok(value)
    }

    /// Sends a raw command and returns the payload verbatim. Bypasses the
    /// cache.
    pub async fn queue_job(&self, command: Command) -> Result<String, RconError> {
        self.dispatch(Lane::Shared, command).await
    }

    async fn dispatch(&self, lane: Lane, command: Command) -> Result<String, RconError> {
        if self.is_closed() {
            return Err(RconError::Closed);
        }

        let limit = self.inner.options.command_timeout;
        let (job, reply) = Job::new(command);
        let exchange = async {
            self.inner.pool.submit(lane, job).await?;
            reply.await.map_err(|_| RconError::Closed)?
        };
        match tokio::time::timeout(limit, exchange).await {
            Ok(result) => result,
            Err(_) => Err(RconError::Timeout(limit)),
        }
    }

    /// Stops every worker, poller and background task and waits for them.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("Client for {} closed", self.inner.config.addr());
    }

    // Worker pool

    pub fn worker_count(&self) -> usize {
        self.inner.pool.worker_count()
    }

    pub fn add_workers(&self, count: usize) {
        self.inner.pool.add_workers(count);
    }

    pub fn remove_workers(&self, count: usize) -> usize {
        self.inner.pool.remove_workers(count)
    }

    pub fn resize(&self, workers: usize) {
        self.inner.pool.resize(workers);
    }

    // Subscriptions

    /// Delivers every event to `subscriber` until unsubscribed.
    pub fn subscribe(&self, subscriber: impl Subscriber + 'static) -> SubscriberId {
        self.inner.notifier.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.notifier.unsubscribe(id)
    }

    pub fn subscribe_kind(&self, kind: EventKind, subscriber: impl Subscriber + 'static) {
        self.inner.notifier.subscribe_kind(kind, subscriber);
    }

    /// Typed subscription, e.g. `client.on(|kill: &KillEvent| ...)`.
    pub fn on<T, F>(&self, callback: F)
    where
        T: TypedEvent + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.notifier.on(callback);
    }

    /// Feeds an event to the subscribers directly, as if a poller had
    /// produced it.
    pub fn publish(&self, event: &Event) {
        self.inner.notifier.dispatch(event);
    }

    // Players

    pub async fn player_names(&self) -> Result<Vec<String>, RconError> {
        Ok(self.execute(&PlayerNamesQuery).await?.0)
    }

    pub async fn player_ids(&self) -> Result<Vec<rcon_shared::PlayerRef>, RconError> {
        Ok(self.execute(&PlayerIdsQuery).await?.0)
    }

    pub async fn player_info(&self, player: &str) -> Result<PlayerInfo, RconError> {
        self.execute(&PlayerInfoQuery::new(player)).await
    }

    /// Every player with full details. Generation 1 fetches each player
    /// separately, spread over the pool; players who leave in between are
    /// skipped.
    pub async fn detailed_players(&self) -> Result<Vec<PlayerInfo>, RconError> {
        if self.generation() == Generation::V2 {
            return Ok(self.execute(&RosterQuery).await?.0);
        }

        let names = self.player_names().await?;
        let mut lookups = JoinSet::new();
        for (index, name) in names.into_iter().enumerate() {
            let client = self.clone();
            lookups.spawn(async move { (index, name.clone(), client.player_info(&name).await) });
        }

        let mut players = Vec::new();
        while let Some(joined) = lookups.join_next().await {
            let Ok((index, name, result)) = joined else {
                continue;
            };
            match result {
                Ok(player) => players.push((index, player)),
                Err(RconError::Closed) => return Err(RconError::Closed),
                Err(e) => debug!("Skipping `{}`: {}", name, e),
            }
        }
        players.sort_by_key(|(index, _)| *index);
        Ok(players.into_iter().map(|(_, player)| player).collect())
    }

    pub async fn game_state(&self) -> Result<GameState, RconError> {
        self.execute(&GameStateQuery).await
    }

    // Moderation

    pub async fn kick(&self, player: &str, reason: &str) -> Result<(), RconError> {
        self.execute(&Kick {
            player: player.to_string(),
            reason: reason.to_string(),
        })
        .await
        .map(drop)
    }

    pub async fn punish(&self, player: &str, reason: &str) -> Result<(), RconError> {
        self.execute(&Punish {
            player: player.to_string(),
            reason: reason.to_string(),
        })
        .await
        .map(drop)
    }

    pub async fn temp_ban(
        &self,
        player: &str,
        hours: u32,
        reason: &str,
        admin: &str,
    ) -> Result<(), RconError> {
        self.execute(&TempBan {
            player: player.to_string(),
            hours,
            reason: reason.to_string(),
            admin: admin.to_string(),
        })
        .await
        .map(drop)
    }

    pub async fn perma_ban(&self, player: &str, reason: &str, admin: &str) -> Result<(), RconError> {
        self.execute(&PermaBan {
            player: player.to_string(),
            reason: reason.to_string(),
            admin: admin.to_string(),
        })
        .await
        .map(drop)
    }

    pub async fn remove_temp_ban(&self, ban_entry: &str) -> Result<(), RconError> {
        self.execute(&RemoveTempBan {
            ban_entry: ban_entry.to_string(),
        })
        .await
        .map(drop)
    }

    pub async fn message_player(&self, player: &str, message: &str) -> Result<(), RconError> {
        self.execute(&MessagePlayer {
            player: player.to_string(),
            message: message.to_string(),
        })
        .await
        .map(drop)
    }

    pub async fn broadcast(&self, message: &str) -> Result<(), RconError> {
        self.execute(&Broadcast {
            message: message.to_string(),
        })
        .await
        .map(drop)
    }

    // Maps

    pub async fn current_map(&self) -> Result<String, RconError> {
        Ok(self.execute(&CurrentMap).await?.0)
    }

    pub async fn rotation(&self) -> Result<Vec<String>, RconError> {
        Ok(self.execute(&RotationQuery).await?.0)
    }

    pub async fn add_to_rotation(&self, map: &str, index: u32) -> Result<(), RconError> {
        self.execute(&AddToRotation {
            map: map.to_string(),
            index,
        })
        .await
        .map(drop)
    }

    pub async fn remove_from_rotation(&self, map: &str, index: u32) -> Result<(), RconError> {
        self.execute(&RemoveFromRotation {
            map: map.to_string(),
            index,
        })
        .await
        .map(drop)
    }

    pub async fn switch_map(&self, map: &str) -> Result<(), RconError> {
        self.execute(&SwitchMap {
            map: map.to_string(),
        })
        .await
        .map(drop)
    }

    // Server settings

    pub async fn server_name(&self) -> Result<String, RconError> {
        Ok(self.execute(&ServerNameQuery).await?.0)
    }

    pub async fn slots(&self) -> Result<Slots, RconError> {
        self.execute(&SlotsQuery).await
    }

    pub async fn set_autobalance(&self, enabled: bool) -> Result<(), RconError> {
        self.execute(&SetAutobalance { enabled }).await.map(drop)
    }

    pub async fn set_idle_kick(&self, minutes: u32) -> Result<(), RconError> {
        self.execute(&SetIdleKick { minutes }).await.map(drop)
    }

    pub async fn set_max_queued_players(&self, count: u32) -> Result<(), RconError> {
        self.execute(&SetMaxQueuedPlayers { count }).await.map(drop)
    }

    // Logs

    pub async fn show_log(&self, window: Duration) -> Result<LogText, RconError> {
        self.execute(&ShowLog::new(window)).await
    }

    /// Log fetch for the poller, routed to the dedicated log worker when one
    /// runs.
    pub(crate) async fn fetch_log(&self, window: Duration) -> Result<LogText, RconError> {
        let lane = if self.inner.options.uses_fast_log_worker() {
            Lane::Log
        } else {
            Lane::Shared
        };
        self.execute_on(lane, &ShowLog::new(window)).await
    }
}

macro_rules! typed_subscriptions {
    ($($method:ident => $payload:ty,)+) => {
        /// One registration helper per event kind.
        impl Client {
            $(
                pub fn $method<F>(&self, callback: F)
                where
                    F: Fn(&$payload) + Send + Sync + 'static,
                {
                    self.on::<$payload, F>(callback);
                }
            )+
        }
    };
}

typed_subscriptions! {
    on_connected => ConnectedEvent,
    on_disconnected => DisconnectedEvent,
    on_kill => KillEvent,
    on_death => DeathEvent,
    on_team_kill => TeamKillEvent,
    on_team_death => TeamDeathEvent,
    on_chat => ChatEvent,
    on_ban => BanEvent,
    on_kick => KickEvent,
    on_message => MessageEvent,
    on_match_start => MatchStartEvent,
    on_match_end => MatchEndEvent,
    on_admin_cam_entered => AdminCamEnteredEvent,
    on_admin_cam_left => AdminCamLeftEvent,
    on_vote_started => VoteStartedEvent,
    on_vote_submitted => VoteSubmittedEvent,
    on_vote_completed => VoteCompletedEvent,
    on_unparsed => UnparsedEvent,
    on_team_switch => TeamSwitchEvent,
    on_squad_switch => SquadSwitchEvent,
    on_role_change => RoleChangeEvent,
    on_loadout_change => LoadoutChangeEvent,
    on_score_update => ScoreUpdateEvent,
    on_position_change => PositionChangeEvent,
    on_clan_tag_change => ClanTagChangeEvent,
    on_objective_capture => ObjectiveCaptureEvent,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if !self.shutdown.is_cancelled() {
            warn!("Client dropped without close(); cancelling background tasks");
            self.shutdown.cancel();
        }
    }
}

//! Integration tests for the RCON client against the mock server
//!
//! These tests run the real client stack over loopback TCP: handshakes,
//! the worker pool's reconnect path, the response cache and the event
//! pipeline.

use assert_approx_eq::assert_approx_eq;
use rcon_client::event::{KillEvent, TeamSwitchEvent};
use rcon_client::{
    Client, ClientOptions, Command, EventKind, Generation, LogPollSettings, RconError,
    ResponseFormat, ServerConfig, Team,
};
use rcon_server::{MockHandle, MockServer, MockSettings, Reply, Script};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tokio_test::{assert_err, assert_ok};

const PASSWORD: &str = "secret";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn start_server(generation: Generation) -> MockHandle {
    init_logging();
    MockServer::bind(
        "127.0.0.1:0",
        MockSettings::new(generation, PASSWORD),
        Script::default(),
    )
    .await
    .expect("bind mock server")
    .spawn()
    .expect("spawn mock server")
}

fn config_for(server: &MockHandle) -> ServerConfig {
    ServerConfig::new("127.0.0.1", server.port(), PASSWORD)
}

fn commands_only(generation: Generation) -> ClientOptions {
    ClientOptions::default()
        .with_generation(generation)
        .with_workers(2)
        .without_events()
}

/// Script key of a generation 2 `GetServerInformation` query.
fn information_key(name: &str) -> String {
    format!(
        "GetServerInformation\t{{\"Name\":\"{}\",\"Value\":\"\"}}",
        name
    )
}

/// CONNECTION AND HANDSHAKE TESTS
mod handshake_tests {
    use super::*;

    /// Tests that a generation 1 client logs in and runs a direct command
    #[tokio::test]
    async fn legacy_connect_and_query() {
        let server = start_server(Generation::V1).await;
        server.script("get name", "Mock Server #1");

        let client =
            assert_ok!(Client::connect(config_for(&server), commands_only(Generation::V1)).await);
        assert_eq!(client.server_name().await.unwrap(), "Mock Server #1");
        assert!(server.logins() >= 1);

        client.close().await;
    }

    /// Tests that a wrong password fails construction with an auth error
    #[tokio::test]
    async fn bad_password_is_fatal() {
        for generation in [Generation::V1, Generation::V2] {
            let server = start_server(generation).await;
            let config = ServerConfig::new("127.0.0.1", server.port(), "wrong");
            let result = Client::connect(config, commands_only(generation)).await;
            assert!(matches!(result, Err(RconError::Auth)), "{}", generation);
        }
    }

    /// Tests an unreachable server
    #[tokio::test]
    async fn refused_connection_is_fatal() {
        let server = start_server(Generation::V1).await;
        let port = server.port();
        server.shutdown();
        sleep(Duration::from_millis(50)).await;

        let config = ServerConfig::new("127.0.0.1", port, PASSWORD);
        let result = Client::connect(config, commands_only(Generation::V1)).await;
        assert!(matches!(result, Err(RconError::Connect { .. })));
    }

    /// Tests the generation 2 handshake, token and JSON decoding
    #[tokio::test]
    async fn framed_connect_and_query() {
        let server = start_server(Generation::V2).await;
        server.script(
            information_key("serverconfig"),
            r#"{"serverName":"Framed Mock"}"#,
        );

        let client = Client::connect(config_for(&server), commands_only(Generation::V2))
            .await
            .unwrap();
        assert_eq!(client.generation(), Generation::V2);
        assert_eq!(client.server_name().await.unwrap(), "Framed Mock");

        let echo = Command::new("Echo", "over the wire", ResponseFormat::Direct);
        assert_eq!(client.queue_job(echo).await.unwrap(), "over the wire");

        client.close().await;
    }

    /// Tests that a generation 2 server with a leading legacy key still works
    #[tokio::test]
    async fn framed_connect_with_legacy_preamble() {
        init_logging();
        let mut settings = MockSettings::new(Generation::V2, PASSWORD);
        settings.legacy_preamble = true;
        let server = MockServer::bind("127.0.0.1:0", settings, Script::default())
            .await
            .unwrap()
            .spawn()
            .unwrap();

        let mut options = commands_only(Generation::V2);
        options.legacy_preamble = true;
        let client = Client::connect(config_for(&server), options).await.unwrap();

        let echo = Command::new("Echo", "hi", ResponseFormat::Direct);
        assert_eq!(client.queue_job(echo).await.unwrap(), "hi");
        client.close().await;
    }
}

/// WORKER POOL TESTS
mod pool_tests {
    use super::*;

    /// Tests that every command of several batches is answered exactly once
    /// while the server drops all connections between batches
    #[tokio::test]
    async fn commands_survive_severed_connections() {
        let server = start_server(Generation::V1).await;
        let options = commands_only(Generation::V1).with_workers(3);
        let client = Client::connect(config_for(&server), options).await.unwrap();

        let batches = 3;
        let per_batch = 10;
        for batch in 0..batches {
            let mut jobs = JoinSet::new();
            for n in 0..per_batch {
                let client = client.clone();
                let tag = format!("job-{}-{}", batch, n);
                jobs.spawn(async move {
                    let command = Command::legacy(format!("echo {}", tag), ResponseFormat::Direct);
                    (tag, client.queue_job(command).await)
                });
            }

            while let Some(joined) = jobs.join_next().await {
                let (tag, reply) = joined.unwrap();
                assert_eq!(reply.unwrap(), tag);
            }

            server.sever_all();
            sleep(Duration::from_millis(50)).await;
        }

        for batch in 0..batches {
            for n in 0..per_batch {
                let key = format!("echo job-{}-{}", batch, n);
                assert_eq!(server.hits(&key), 1, "{}", key);
            }
        }
        assert!(server.accepted() > 4, "workers reconnected");

        client.close().await;
    }

    /// Tests that a command whose connection is severed mid-reply is retried
    /// on a fresh connection and answered once
    #[tokio::test]
    async fn command_survives_sever_while_in_flight() {
        let server = start_server(Generation::V1).await;
        server.script_reply(
            "get map",
            Reply::delayed("foy_warfare", Duration::from_millis(400)),
        );
        let client = Client::connect(config_for(&server), commands_only(Generation::V1))
            .await
            .unwrap();

        let pending = {
            let client = client.clone();
            tokio::spawn(async move { client.current_map().await })
        };
        timeout(Duration::from_secs(2), async {
            while server.hits("get map") < 1 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("command never reached the server");
        assert!(server.sever_all() >= 1);

        let map = timeout(Duration::from_secs(5), pending)
            .await
            .expect("caller never answered")
            .unwrap();
        assert_eq!(assert_ok!(map), "foy_warfare");
        // Sent once on the severed connection and once after reconnecting.
        assert_eq!(server.hits("get map"), 2);

        client.close().await;
    }

    /// Tests runtime resizing of the pool
    #[tokio::test]
    async fn pool_resizes_at_runtime() {
        let server = start_server(Generation::V1).await;
        let client = Client::connect(config_for(&server), commands_only(Generation::V1))
            .await
            .unwrap();
        assert_eq!(client.worker_count(), 2);

        client.add_workers(3);
        assert_eq!(client.worker_count(), 5);
        assert_eq!(client.remove_workers(4), 4);
        assert_eq!(client.worker_count(), 1);

        let echo = Command::legacy("echo still working", ResponseFormat::Direct);
        assert_eq!(client.queue_job(echo).await.unwrap(), "still working");

        client.resize(4);
        assert_eq!(client.worker_count(), 4);

        client.close().await;
    }

    /// Tests the per-command deadline on a server that answers too late
    #[tokio::test]
    async fn slow_reply_times_out() {
        let server = start_server(Generation::V1).await;
        server.script_reply("get map", Reply::delayed("foy_warfare", Duration::from_secs(3)));

        let mut options = commands_only(Generation::V1);
        options.command_timeout = Duration::from_millis(500);
        let client = Client::connect(config_for(&server), options).await.unwrap();

        let result = client.current_map().await;
        assert!(matches!(result, Err(RconError::Timeout(_))), "{:?}", result);

        client.close().await;
    }

    /// Tests that commands fail fast after close
    #[tokio::test]
    async fn closed_client_rejects_commands() {
        let server = start_server(Generation::V1).await;
        let client = Client::connect(config_for(&server), commands_only(Generation::V1))
            .await
            .unwrap();
        client.close().await;

        assert!(client.is_closed());
        let echo = Command::legacy("echo late", ResponseFormat::Direct);
        assert!(matches!(client.queue_job(echo).await, Err(RconError::Closed)));
    }
}

/// COMMAND SURFACE TESTS
mod command_tests {
    use super::*;

    /// Tests that cached responses skip the server until their TTL lapses
    #[tokio::test]
    async fn cache_ttl_hits_and_misses() {
        let server = start_server(Generation::V1).await;
        server.script("get name", "Cached");
        server.script("get players", "1\tAlpha\t");
        server.script("get playerids", "1\tAlpha : 76561198000000001\t");

        let client = Client::connect(config_for(&server), commands_only(Generation::V1))
            .await
            .unwrap();

        // Server name is cached for a minute.
        client.server_name().await.unwrap();
        client.server_name().await.unwrap();
        assert_eq!(server.hits("get name"), 1);

        // Player names are never cached.
        client.player_names().await.unwrap();
        client.player_names().await.unwrap();
        assert_eq!(server.hits("get players"), 2);

        // Player ids live for two seconds.
        let ids = client.player_ids().await.unwrap();
        assert_eq!(ids[0].player_id, "76561198000000001");
        client.player_ids().await.unwrap();
        assert_eq!(server.hits("get playerids"), 1);

        sleep(Duration::from_millis(2200)).await;
        client.player_ids().await.unwrap();
        assert_eq!(server.hits("get playerids"), 2);

        client.close().await;
    }

    /// Tests that disabling the cache sends every query
    #[tokio::test]
    async fn disabled_cache_always_queries() {
        let server = start_server(Generation::V1).await;
        server.script("get name", "Uncached");

        let mut options = commands_only(Generation::V1);
        options.cache_enabled = false;
        let client = Client::connect(config_for(&server), options).await.unwrap();

        client.server_name().await.unwrap();
        client.server_name().await.unwrap();
        assert_eq!(server.hits("get name"), 2);

        client.close().await;
    }

    /// Tests that a refused action carries the command line
    #[tokio::test]
    async fn refused_action_reports_command() {
        let server = start_server(Generation::V1).await;
        server.script("say hello", "SUCCESS");

        let client = Client::connect(config_for(&server), commands_only(Generation::V1))
            .await
            .unwrap();

        assert_ok!(client.broadcast("hello").await);
        match client.kick("Alpha", "AFK").await {
            Err(RconError::Rejected { command, reply }) => {
                assert_eq!(command, "kick Alpha AFK");
                assert_eq!(reply, "FAIL");
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        client.close().await;
    }

    /// Tests the generation 1 roster composed from per-player lookups
    #[tokio::test]
    async fn legacy_detailed_players() {
        let server = start_server(Generation::V1).await;
        server.script("get players", "3\tAlpha\tBravo\tGhost\t");
        server.script(
            "playerinfo Alpha",
            "Name: Alpha\nsteamID64: 1\nTeam: Allies\nRole: Rifleman\nUnit: 0 - Able\nLoadout: Standard Issue\nKills: 3 - Deaths: 1\nScore: C 10, O 20, D 0, S 5\nLevel: 42",
        );
        server.script(
            "playerinfo Bravo",
            "Name: Bravo\nsteamID64: 2\nTeam: Axis\nRole: Medic\nUnit: 1 - Baker\nLoadout: Standard Issue\nKills: 1 - Deaths: 3\nScore: C 5, O 0, D 15, S 30\nLevel: 7",
        );
        // Ghost left between the two queries: "playerinfo Ghost" answers FAIL.

        let client = Client::connect(config_for(&server), commands_only(Generation::V1))
            .await
            .unwrap();
        let players = client.detailed_players().await.unwrap();

        let names: Vec<&str> = players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Bravo"]);
        assert_eq!(players[1].team, Team::Axis);
        assert_eq!(players[0].unit.as_deref(), Some("Able"));
        assert_eq!(server.hits("playerinfo Ghost"), 1);

        client.close().await;
    }

    /// Tests the generation 2 roster and commands it cannot express
    #[tokio::test]
    async fn framed_roster_and_unsupported_commands() {
        let server = start_server(Generation::V2).await;
        server.script(
            information_key("players"),
            r#"{"players":[{"name":"Alpha","iD":"1","team":0,"platoon":"ABLE",
                "worldPosition":{"x":1250.5,"y":-300.25,"z":12.0}}]}"#,
        );

        let client = Client::connect(config_for(&server), commands_only(Generation::V2))
            .await
            .unwrap();

        let players = client.detailed_players().await.unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].team, Team::Allies);
        assert_approx_eq!(players[0].position.x, 1250.5, 1e-9);

        assert!(matches!(
            client.slots().await,
            Err(RconError::NotSupported { .. })
        ));
        let unsupported = assert_err!(client.player_ids().await);
        assert_eq!(
            unsupported.to_string(),
            "`player_ids` is not supported by protocol v2"
        );
        assert!(matches!(
            client.remove_temp_ban("ban entry").await,
            Err(RconError::NotSupported { .. })
        ));

        client.close().await;
    }
}

/// EVENT PIPELINE TESTS
mod event_tests {
    use super::*;

    const KILL_LINE: &str = "[1:02 min (1639143555)] KILL: Alpha(Axis/76561198000000001) -> Bravo(Allies/76561198000000002) with MP40\n";

    fn log_options(fast_log_worker: bool) -> ClientOptions {
        let mut options = commands_only(Generation::V1);
        options.fast_log_worker = fast_log_worker;
        options.log_poll = Some(LogPollSettings {
            interval: Duration::from_millis(100),
            window: Duration::from_secs(60),
        });
        options
    }

    async fn wait_for_hits(server: &MockHandle, key: &str, hits: usize) {
        timeout(Duration::from_secs(5), async {
            while server.hits(key) < hits {
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("poller never reached the server");
    }

    async fn kill_reaches_subscriber(fast_log_worker: bool) {
        let server = start_server(Generation::V1).await;
        // Present before the first poll: must not be reported.
        server.script("showlog 1", KILL_LINE);

        let client = Client::connect(config_for(&server), log_options(fast_log_worker))
            .await
            .unwrap();

        let (tx, mut kills) = mpsc::unbounded_channel();
        client.on_kill(move |kill: &KillEvent| {
            let _ = tx.send(kill.clone());
        });
        let (kinds_tx, mut kinds) = mpsc::unbounded_channel();
        client.subscribe(move |event: &rcon_client::Event| {
            let _ = kinds_tx.send(event.kind());
        });

        wait_for_hits(&server, "showlog 1", 2).await;
        assert!(kills.try_recv().is_err(), "first poll must be suppressed");

        let later = KILL_LINE.replace("1639143555", "1639143600");
        server.script("showlog 1", format!("{}{}", KILL_LINE, later));

        let kill = timeout(Duration::from_secs(5), kills.recv())
            .await
            .expect("kill event")
            .unwrap();
        assert_eq!(kill.killer.name, "Alpha");
        assert_eq!(kill.victim.name, "Bravo");
        assert_eq!(kill.weapon, "MP40");
        assert_eq!(kill.timestamp.timestamp(), 1639143600);

        let first = timeout(Duration::from_secs(1), kinds.recv()).await.unwrap();
        let second = timeout(Duration::from_secs(1), kinds.recv()).await.unwrap();
        assert_eq!(first, Some(EventKind::Kill));
        assert_eq!(second, Some(EventKind::Death));

        client.close().await;
    }

    /// Tests log lines flowing from the server to a typed subscriber
    #[tokio::test]
    async fn log_poller_delivers_new_lines_only() {
        kill_reaches_subscriber(false).await;
    }

    /// Tests the same flow through the dedicated early-stop log worker
    #[tokio::test]
    async fn fast_log_worker_delivers_events() {
        kill_reaches_subscriber(true).await;
    }

    /// Tests that dropping the last handle without close() stops the pollers
    /// and the workers
    #[tokio::test]
    async fn dropped_client_releases_connections() {
        let server = start_server(Generation::V1).await;
        server.script("showlog 1", "EMPTY");
        server.script("get players", "0");

        let mut options = log_options(false);
        options.snapshot_poll = Some(Duration::from_millis(100));
        let client = Client::connect(config_for(&server), options).await.unwrap();

        wait_for_hits(&server, "showlog 1", 1).await;
        wait_for_hits(&server, "get players", 1).await;
        assert!(server.active_sessions() >= 2);
        drop(client);

        timeout(Duration::from_secs(5), async {
            while server.active_sessions() > 0 {
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("sessions left open after the client was dropped");
    }

    /// Tests snapshot diffs reaching subscribers
    #[tokio::test]
    async fn snapshot_poller_reports_team_switch() {
        let server = start_server(Generation::V1).await;
        server.script("get players", "1\tAlpha\t");
        server.script(
            "playerinfo Alpha",
            "Name: Alpha\nsteamID64: 1\nTeam: Allies\nRole: Rifleman\nLoadout: Standard Issue\nKills: 0 - Deaths: 0\nScore: C 0, O 0, D 0, S 0\nLevel: 1",
        );
        server.script(
            "get gamestate",
            "Players: Allied: 1 - Axis: 0\nScore: Allied: 2 - Axis: 2\nRemaining Time: 1:00:00\nMap: foy_warfare\nNext Map: utahbeach_warfare",
        );

        let mut options = commands_only(Generation::V1);
        options.snapshot_poll = Some(Duration::from_millis(100));
        let client = Client::connect(config_for(&server), options).await.unwrap();

        let (tx, mut switches) = mpsc::unbounded_channel();
        client.on_team_switch(move |switch: &TeamSwitchEvent| {
            let _ = tx.send(switch.clone());
        });

        wait_for_hits(&server, "get gamestate", 1).await;
        server.script(
            "playerinfo Alpha",
            "Name: Alpha\nsteamID64: 1\nTeam: Axis\nRole: Rifleman\nLoadout: Standard Issue\nKills: 0 - Deaths: 0\nScore: C 0, O 0, D 0, S 0\nLevel: 1",
        );

        let switch = timeout(Duration::from_secs(5), switches.recv())
            .await
            .expect("team switch event")
            .unwrap();
        assert_eq!(switch.player, "Alpha");
        assert_eq!((switch.old, switch.new), (Team::Allies, Team::Axis));

        client.close().await;
    }
}

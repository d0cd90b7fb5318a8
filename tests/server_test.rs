// End-to-end tests against a server bound to an ephemeral port

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use yahtzee_net::client::{network, ClientUi};
use yahtzee_net::config::{ClientConfig, ServerConfig};
use yahtzee_net::core::server::{GameServer, RunningServer};
use yahtzee_net::core::session::Phase;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server(max_round: u32, max_players: usize) -> RunningServer {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_round,
        max_players,
        queue_capacity: 8,
        admission_pause: Duration::from_millis(10),
    };
    GameServer::new(config)
        .expect("valid config")
        .bind()
        .await
        .expect("server binds")
}

/// A raw protocol client speaking lines over TCP
struct LineClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl LineClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn next(&mut self) -> String {
        timeout(READ_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a server line")
            .expect("read error")
            .expect("server closed the connection")
    }

    /// Skip lines until one carries `frame`
    async fn expect(&mut self, frame: &str) -> String {
        loop {
            let line = self.next().await;
            if line.split_whitespace().nth(1) == Some(frame) {
                return line;
            }
        }
    }

    async fn is_silent_for(&mut self, duration: Duration) -> bool {
        timeout(duration, self.lines.next_line()).await.is_err()
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .expect("write");
    }

    /// Wait for `frame` and answer it with `reply`, where `{}` is the request id
    async fn answer(&mut self, frame: &str, reply: &str) {
        let line = self.expect(frame).await;
        let id = msg_id(&line);
        self.send(&reply.replace("{}", &id.to_string())).await;
    }

    /// Answer a request line that was already read
    async fn answer_line_with(&mut self, line: &str, reply: &str) {
        self.send(&reply.replace("{}", &msg_id(line).to_string())).await;
    }

    async fn play_turn(&mut self) {
        self.answer("START_TURN", "ACK {}").await;
        self.answer("CHOOSE_DICE", "KEEP_DICE {} 0 0 0 0 0").await;
        self.answer("CHOOSE_DICE", "KEEP_DICE {} 1 1 0 0 0").await;
        self.answer("CHOOSE_SCORE", "SCORE_CHOICE {} Chance").await;
        self.answer("TURN_OVER", "ACK {}").await;
    }
}

fn msg_id(line: &str) -> u64 {
    line.split_whitespace()
        .nth(2)
        .and_then(|t| t.parse().ok())
        .expect("line carries a message id")
}

/// Seat two players and get both through START_GAME
async fn seat_two(addr: SocketAddr) -> (LineClient, LineClient) {
    let mut c1 = LineClient::connect(addr).await;
    c1.expect("START_GAME").await;

    let mut c2 = LineClient::connect(addr).await;
    c2.answer("START_GAME", "ACK {}").await;
    // c1 is asked again once c2 has joined
    c1.answer("START_GAME", "ACK {}").await;

    (c1, c2)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_line_is_reported_to_sender() {
    let server = start_server(1, 2).await;
    let mut client = LineClient::connect(server.local_addr()).await;
    client.expect("START_GAME").await;

    client.send("FLY 1").await;
    let notice = client.expect("INFO").await;
    assert!(notice.ends_with("FORMAT CHECK ERROR. Invalid frame was given."));

    client.send("KEEP_DICE 1 0 0 0 0").await;
    let notice = client.expect("INFO").await;
    assert!(notice.ends_with("FORMAT CHECK ERROR. Wrong number of payload was given."));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_game_then_waiting_socket_is_admitted() {
    let server = start_server(1, 2).await;
    let addr = server.local_addr();
    let (mut c1, mut c2) = seat_two(addr).await;

    // A third player queues while both seats are taken
    let mut c3 = LineClient::connect(addr).await;

    c1.answer("START_ROUND", "ACK {}").await;
    c2.answer("START_ROUND", "ACK {}").await;
    c1.play_turn().await;
    c2.play_turn().await;
    c1.answer("ROUND_OVER", "ACK {}").await;
    c2.answer("ROUND_OVER", "ACK {}").await;

    let over = c1.expect("GAME_OVER").await;
    assert!(over.contains("PLAYER-1:"));
    assert!(over.contains("PLAYER-2:"));
    c2.expect("GAME_OVER").await;
    {
        let session = server.session();
        let session = session.lock().unwrap();
        assert_eq!(session.phase(), Phase::GameOver);
    }
    assert!(c3.is_silent_for(Duration::from_millis(200)).await);

    drop(c1);
    drop(c2);

    let welcome = c3.expect("INFO").await;
    assert_eq!(
        welcome,
        "[SERVER] INFO 1 You joined the game now. Your name is PLAYER-3. Please enjoy yourself."
    );
    let start = c3.expect("START_GAME").await;
    assert_eq!(start, "[SERVER] START_GAME 3 <NEED RESPONSE>");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mid_round_join_is_deferred_to_next_round() {
    let server = start_server(2, 3).await;
    let addr = server.local_addr();
    let (mut c1, mut c2) = seat_two(addr).await;

    c1.answer("START_ROUND", "ACK {}").await;
    c2.answer("START_ROUND", "ACK {}").await;
    c1.answer("START_TURN", "ACK {}").await;
    let first_roll = c1.expect("CHOOSE_DICE").await;

    let mut c3 = LineClient::connect(addr).await;
    assert!(c3.is_silent_for(Duration::from_millis(300)).await);
    assert_eq!(server.session().lock().unwrap().player_count(), 2);

    c1.send("PRINT_GAME_STATE 1").await;
    let state = c1.expect("GAME_STATE").await;
    assert!(state.contains("STATE: Rolling"));

    c1.answer_line_with(&first_roll, "KEEP_DICE {} 1 1 1 1 1").await;
    c1.answer("CHOOSE_DICE", "KEEP_DICE {} 1 1 1 1 1").await;
    c1.answer("CHOOSE_SCORE", "SCORE_CHOICE {} Chance").await;
    c1.answer("TURN_OVER", "ACK {}").await;
    c2.play_turn().await;
    assert!(c3.is_silent_for(Duration::from_millis(100)).await);

    c1.answer("ROUND_OVER", "ACK {}").await;
    c2.answer("ROUND_OVER", "ACK {}").await;

    let welcome = c3.expect("INFO").await;
    assert!(welcome.contains("Your name is PLAYER-3."));
    let round = c3.expect("START_ROUND").await;
    assert!(round.ends_with(" 2 <NEED RESPONSE>"));

    c3.answer_line_with(&round, "ACK {}").await;
    c1.answer("START_ROUND", "ACK {}").await;
    c2.answer("START_ROUND", "ACK {}").await;
    c1.expect("START_TURN").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queued_socket_takes_freed_seat() {
    for _ in 0..10 {
        let server = start_server(1, 1).await;
        let addr = server.local_addr();

        let mut a = LineClient::connect(addr).await;
        a.expect("START_GAME").await;
        let mut b = LineClient::connect(addr).await;
        assert!(b.is_silent_for(Duration::from_millis(50)).await);

        drop(a);

        let welcome = b.expect("INFO").await;
        assert!(welcome.contains("Your name is PLAYER-2."));
        b.expect("START_GAME").await;
        assert_eq!(server.session().lock().unwrap().player_count(), 1);
        assert_eq!(server.active_workers(), 1);
    }
}

#[derive(Clone, Default)]
struct SharedUi {
    lines: Arc<Mutex<Vec<String>>>,
}

impl SharedUi {
    /// Poll until a shown line carries `frame`, returning the newest such line
    async fn wait_for(&self, frame: &str) -> String {
        let deadline = tokio::time::Instant::now() + READ_TIMEOUT;
        loop {
            let found = self
                .lines
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|l| l.starts_with("[SERVER]") && l.split_whitespace().nth(1) == Some(frame))
                .cloned();
            if let Some(line) = found {
                return line;
            }
            assert!(tokio::time::Instant::now() < deadline, "no {} shown", frame);
            sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until a `frame` request newer than `after` is shown, returning its id
    async fn wait_for_after(&self, frame: &str, after: u64) -> u64 {
        let deadline = tokio::time::Instant::now() + READ_TIMEOUT;
        loop {
            let id = msg_id(&self.wait_for(frame).await);
            if id > after {
                return id;
            }
            assert!(tokio::time::Instant::now() < deadline, "no new {} shown", frame);
            sleep(Duration::from_millis(10)).await;
        }
    }
}

impl ClientUi for SharedUi {
    fn show_server_message(&mut self, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }
    fn show_client_message(&mut self, message: &str) {
        self.lines.lock().unwrap().push(format!("client: {}", message));
    }
    fn show_network_status(&mut self, status: &str) {
        self.lines.lock().unwrap().push(format!("network: {}", status));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_plays_single_player_game() {
    let server = start_server(1, 1).await;
    let config = ClientConfig {
        host: "127.0.0.1".to_string(),
        port: server.local_addr().port(),
    };

    let ui = SharedUi::default();
    let (mut keyboard, input) = tokio::io::duplex(1024);
    let client = tokio::spawn({
        let ui = ui.clone();
        async move { network::run(&config, ui, BufReader::new(input)).await }
    });

    let script = [
        ("START_GAME", "ACK {}"),
        ("START_ROUND", "ACK {}"),
        ("START_TURN", "ACK {}"),
        ("CHOOSE_DICE", "KEEP_DICE {} 1 1 1 1 1"),
        ("CHOOSE_DICE", "KEEP_DICE {} 1 1 1 1 1"),
        ("CHOOSE_SCORE", "SCORE_CHOICE {} Yahtzee"),
        ("TURN_OVER", "ACK {}"),
        ("ROUND_OVER", "ACK {}"),
    ];
    let mut last_answered = 0;
    for (frame, reply) in script {
        // ids only grow, so a newer request of the same frame has a larger id
        let id = ui.wait_for_after(frame, last_answered).await;
        last_answered = id;
        let typed = format!("{}\n", reply.replace("{}", &id.to_string()));
        keyboard.write_all(typed.as_bytes()).await.unwrap();
    }

    let over_id = ui.wait_for_after("GAME_OVER", last_answered).await;
    let over = ui.wait_for("GAME_OVER").await;
    assert!(over.contains("Yahtzee:"));
    keyboard
        .write_all(format!("ACK {}\n", over_id).as_bytes())
        .await
        .unwrap();
    drop(keyboard);

    timeout(READ_TIMEOUT, client)
        .await
        .expect("client exits after the game")
        .unwrap()
        .unwrap();
    assert!(!ui
        .lines
        .lock()
        .unwrap()
        .iter()
        .any(|l| l.starts_with("client: ")));
}

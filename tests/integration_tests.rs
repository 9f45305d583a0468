use lights_out::error::HandlerFault;
use lights_out::server::{start_server_with, ServeConfig, ServeControl};
use reqwest::StatusCode;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration};

const FORM: &str = "application/x-www-form-urlencoded";

/// Bind to port 0 and let the OS assign a free port, avoiding collisions in parallel test runs.
fn get_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

// Helper to create a test server
fn create_test_server(
    temp_dir: &Path,
    port: u16,
    control: ServeControl,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    let config = ServeConfig {
        public_dir: temp_dir.to_path_buf(),
        port,
        timeout: Duration::from_millis(250),
        seed: Some(1),
        log_requests: false,
    };

    tokio::spawn(start_server_with(config, control))
}

/// Send raw bytes and collect everything until the server closes the connection.
async fn raw_exchange(port: u16, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut received = Vec::new();
    stream.read_to_end(&mut received).await.unwrap();
    received
}

fn no_redirects() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_static_files_served_byte_for_byte() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0xFF];
    fs::create_dir(temp_path.join("styles")).unwrap();
    fs::write(temp_path.join("styles").join("styles.css"), "body { margin: 0 }").unwrap();
    fs::write(temp_path.join("logo.png"), png).unwrap();
    fs::write(temp_path.join("notes.txt"), "plain notes\n").unwrap();
    fs::write(temp_path.join("app.js"), "console.log(1)").unwrap();
    fs::write(temp_path.join("data.bin"), [0u8, 1, 2, 3]).unwrap();

    let port = get_free_port();
    let _server = create_test_server(temp_path, port, ServeControl::new());
    sleep(Duration::from_millis(100)).await;

    let cases: [(&str, &str, Vec<u8>); 5] = [
        ("/styles/styles.css", "text/css; charset=utf-8", b"body { margin: 0 }".to_vec()),
        ("/logo.png", "image/png", png.to_vec()),
        ("/notes.txt", "text/plain; charset=utf-8", b"plain notes\n".to_vec()),
        ("/app.js", "text/javascript; charset=utf-8", b"console.log(1)".to_vec()),
        ("/data.bin", "application/octet-stream", vec![0, 1, 2, 3]),
    ];

    for (path, content_type, body) in cases {
        let response = reqwest::get(format!("http://127.0.0.1:{port}{path}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "Path: {path}");
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            content_type,
            "Path: {path}"
        );
        assert_eq!(response.headers().get("connection").unwrap(), "close");
        assert_eq!(response.bytes().await.unwrap().to_vec(), body, "Path: {path}");
    }
}

#[tokio::test]
async fn test_path_traversal_protection() {
    let temp_dir = TempDir::new().unwrap();
    let public = temp_dir.path().join("public");
    fs::create_dir(&public).unwrap();
    fs::write(public.join("safe.txt"), "safe content").unwrap();
    fs::write(temp_dir.path().join("secret.txt"), "secret").unwrap();

    let port = get_free_port();
    let _server = create_test_server(&public, port, ServeControl::new());
    sleep(Duration::from_millis(100)).await;

    for path in ["./secret.txt", "../secret.txt", "/../secret.txt", "/%2e%2e/secret.txt", "/.env"] {
        let request = format!("GET {path} HTTP/1.1\r\n\r\n");
        let received = raw_exchange(port, request.as_bytes()).await;
        let text = String::from_utf8_lossy(&received);
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"), "Path: {path}");
        assert!(!text.contains("secret"), "Path: {path}");
    }

    let response = reqwest::get(format!("http://127.0.0.1:{port}/missing.html"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = reqwest::get(format!("http://127.0.0.1:{port}/safe.txt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_forbidden_without_active_game() {
    let temp_dir = TempDir::new().unwrap();

    let port = get_free_port();
    let _server = create_test_server(temp_dir.path(), port, ServeControl::new());
    sleep(Duration::from_millis(100)).await;

    let received = raw_exchange(port, b"GET /game.html HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
    let text = String::from_utf8(received).unwrap();

    assert_eq!(
        text,
        "HTTP/1.1 403 Forbidden\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: 43\r\n\
         Connection: close\r\n\
         \r\n\
         <h1>403 Forbidden</h1><p>No active game</p>"
    );
    assert_eq!(text.matches("HTTP/1.1").count(), 1);
}

#[tokio::test]
async fn test_full_game_reaches_scoreboard() {
    let temp_dir = TempDir::new().unwrap();

    let port = get_free_port();
    let _server = create_test_server(temp_dir.path(), port, ServeControl::new());
    sleep(Duration::from_millis(100)).await;

    let client = no_redirects();
    let base = format!("http://127.0.0.1:{port}");

    let response = client
        .post(format!("{base}/game.html"))
        .header("Content-Type", FORM)
        .body("player_name=Ann+Lee&number_of_lights=3&off_lights=0")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = response.text().await.unwrap();
    assert_eq!(page.matches("class=\"button_o\"").count(), 3);

    // Press 1 twice (back to OOO), then 2 lights everything
    for button in ["1", "1"] {
        let response = client
            .post(format!("{base}/toggle_light"))
            .header("Content-Type", FORM)
            .body(format!("button_index={button}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = client
        .post(format!("{base}/toggle_light"))
        .header("Content-Type", "text/plain")
        .body("button_index=2\r\n")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "/best_scores.html"
    );

    // The game is over
    let response = client.get(format!("{base}/game.html")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .get(format!("{base}/best_scores.html"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let scores = response.text().await.unwrap();
    assert!(scores.contains("<td>3</td>"));
    assert!(scores.contains("<td>Ann Lee</td>"));
}

/// Start a game with every light `O` and press `buttons` in order.
async fn play(client: &reqwest::Client, base: &str, size: usize, name: &str, buttons: &[usize]) {
    let response = client
        .post(format!("{base}/game.html"))
        .header("Content-Type", FORM)
        .body(format!("number_of_lights={size}&off_lights=0&player_name={name}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for button in buttons {
        client
            .post(format!("{base}/toggle_light"))
            .header("Content-Type", FORM)
            .body(format!("button_index={button}"))
            .send()
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_scoreboard_keeps_best_per_size_in_order() {
    let temp_dir = TempDir::new().unwrap();

    let port = get_free_port();
    let _server = create_test_server(temp_dir.path(), port, ServeControl::new());
    sleep(Duration::from_millis(100)).await;

    let client = no_redirects();
    let base = format!("http://127.0.0.1:{port}");

    play(&client, &base, 3, "slow", &[1, 1, 2]).await;
    play(&client, &base, 1, "single", &[1]).await;
    play(&client, &base, 2, "pair", &[1]).await;
    play(&client, &base, 3, "fast", &[2]).await;
    play(&client, &base, 3, "slower", &[1, 1, 1, 1, 2]).await;

    let scores = client
        .get(format!("{base}/best_scores.html"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let single = scores.find("<td>single</td>").unwrap();
    let pair = scores.find("<td>pair</td>").unwrap();
    let fast = scores.find("<td>fast</td>").unwrap();
    assert!(single < pair && pair < fast);
    assert!(!scores.contains("slow"));
}

#[tokio::test]
async fn test_shutdown_route_stops_server_silently() {
    let temp_dir = TempDir::new().unwrap();

    let port = get_free_port();
    let server = create_test_server(temp_dir.path(), port, ServeControl::new());
    sleep(Duration::from_millis(100)).await;

    let received = raw_exchange(port, b"GET /shutdown HTTP/1.1\r\n\r\n").await;
    assert!(received.is_empty());

    let finished = timeout(Duration::from_secs(5), server).await;
    assert!(matches!(finished, Ok(Ok(Ok(())))));
}

#[tokio::test]
async fn test_control_bounds_connections_and_collects_faults() {
    let temp_dir = TempDir::new().unwrap();

    let port = get_free_port();
    let control = ServeControl::new().with_max_connections(2);
    let server = create_test_server(temp_dir.path(), port, control.clone());
    sleep(Duration::from_millis(100)).await;

    // Toggling with no game running is a handler fault: no response at all
    let received = raw_exchange(
        port,
        b"POST /toggle_light HTTP/1.1\r\nContent-Type: text/plain\r\nContent-Length: 14\r\n\r\nbutton_index=1",
    )
    .await;
    assert!(received.is_empty());

    // A malformed request aborts the connection but is not a handler fault
    let received = raw_exchange(port, b"GARBAGE\r\n\r\n").await;
    assert!(received.is_empty());

    let finished = timeout(Duration::from_secs(5), server).await;
    assert!(matches!(finished, Ok(Ok(Ok(())))));

    let faults = control.take_faults();
    assert_eq!(faults.len(), 1);
    assert!(matches!(faults[0], HandlerFault::NoActiveGame));
}

#[tokio::test]
async fn test_external_stop() {
    let temp_dir = TempDir::new().unwrap();

    let port = get_free_port();
    let control = ServeControl::new();
    let server = create_test_server(temp_dir.path(), port, control.clone());
    sleep(Duration::from_millis(100)).await;

    control.stop();
    let finished = timeout(Duration::from_secs(5), server).await;
    assert!(matches!(finished, Ok(Ok(Ok(())))));
}

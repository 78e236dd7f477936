//! Réplicas que reciben SIGTERM con una conexión a medio leer
//! tests/replica_drain.rs
//!
//! Binario propio: hace fork y consulta `waitpid(-1)`. Acá nadie llama a
//! `register_signals`, como cuando el servidor se usa como biblioteca.

use otu_server::config::Config;
use otu_server::dispatch::DispatchMode;
use otu_server::server::Server;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

fn fetch(mut stream: TcpStream) -> Vec<u8> {
    stream.write_all(b"GET /a.txt HTTP/1.0\r\n\r\n").unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    response
}

#[test]
fn test_replica_finishes_stalled_connection_after_sigterm() {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("a.txt"), b"alpha").unwrap();

    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        document_root: Some(root.path().to_path_buf()),
        workers: 2,
        mode: DispatchMode::EventLoop,
        poll_interval_ms: 50,
        timeout_secs: 10,
    };

    let server = Server::bind(config).unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_token();
    // Son los contadores del proceso padre; las réplicas llevan copias
    let parent_stats = server.stats();
    let handle = thread::spawn(move || server.run());

    thread::sleep(Duration::from_millis(300));

    // Tres clientes mudos: cada proceso queda bloqueado leyendo uno
    let mut clients = Vec::new();
    let mut parent_client = None;
    for i in 0..3 {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        clients.push(stream);

        thread::sleep(Duration::from_millis(300));
        if parent_client.is_none() && parent_stats.in_flight() == 1 {
            parent_client = Some(i);
        }
    }
    let parent_client = parent_client.expect("the parent process never took a connection");

    shutdown.request();

    // El padre responde, sale del loop y manda SIGTERM a las réplicas
    let response = fetch(clients.remove(parent_client));
    assert!(response.starts_with(b"HTTP/1.0 200 OK\r\n"));
    thread::sleep(Duration::from_millis(500));

    // Las réplicas siguen vivas y terminan la conexión que tenían
    for stream in clients {
        let response = fetch(stream);
        assert!(
            response.starts_with(b"HTTP/1.0 200 OK\r\n"),
            "replica dropped its connection: {:?}",
            String::from_utf8_lossy(&response)
        );
        assert!(response.ends_with(b"alpha"));
    }

    assert!(shutdown.wait_stopped_timeout(Duration::from_secs(10)));
    handle.join().unwrap().unwrap();

    let mut status = 0;
    assert_eq!(unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG) }, -1);
}

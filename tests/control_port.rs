//! Control port client against a scripted in-process control server

use oonib::tor::{ControlChannel, HiddenServiceConfig, TorController};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Answers control commands the way a bootstrapped Tor would
async fn fake_tor(reject_setconf: bool) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            log.lock().unwrap().push(line.clone());
            let reply = if line.starts_with("AUTHENTICATE") {
                "250 OK\r\n".to_string()
            } else if line == "TAKEOWNERSHIP" {
                // An async event interleaved before the reply
                "650 STATUS_CLIENT NOTICE CIRCUIT_ESTABLISHED\r\n250 OK\r\n".to_string()
            } else if line.starts_with("SETCONF") && reject_setconf {
                "552 Unrecognized option\r\n".to_string()
            } else {
                "250 OK\r\n".to_string()
            };
            if write.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    (addr, seen)
}

fn cookie(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("control_auth_cookie");
    std::fs::write(&path, [0xab_u8; 32]).unwrap();
    path
}

#[tokio::test]
async fn test_cookie_authentication() {
    let tmp = tempfile::tempdir().unwrap();
    let (addr, seen) = fake_tor(false).await;

    let controller = TorController::connect(&addr.to_string(), &cookie(&tmp))
        .await
        .unwrap();
    assert!(controller.is_authenticated());

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], format!("AUTHENTICATE {}", "ab".repeat(32)));
}

#[tokio::test]
async fn test_missing_cookie_fails() {
    let (addr, _) = fake_tor(false).await;
    let cookie = Path::new("/nonexistent/control_auth_cookie");

    assert!(TorController::connect(&addr.to_string(), cookie).await.is_err());
}

#[tokio::test]
async fn test_take_ownership() {
    let tmp = tempfile::tempdir().unwrap();
    let (addr, seen) = fake_tor(false).await;
    let mut controller = TorController::connect(&addr.to_string(), &cookie(&tmp))
        .await
        .unwrap();

    // The 650 event before the reply is skipped, not taken as the reply
    controller.take_ownership().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[1], "TAKEOWNERSHIP");
    assert_eq!(seen[2], "RESETCONF __OwningControllerProcess");
}

#[tokio::test]
async fn test_configure_hidden_services() {
    let tmp = tempfile::tempdir().unwrap();
    let (addr, seen) = fake_tor(false).await;
    let mut controller = TorController::connect(&addr.to_string(), &cookie(&tmp))
        .await
        .unwrap();

    let services = vec![
        HiddenServiceConfig {
            dir: PathBuf::from("/var/lib/oonib/collector"),
            public_port: 80,
            target: "127.0.0.1:40001".parse().unwrap(),
        },
        HiddenServiceConfig {
            dir: PathBuf::from("/var/lib/oonib/bouncer"),
            public_port: 80,
            target: "127.0.0.1:40002".parse().unwrap(),
        },
    ];
    controller.configure_hidden_services(&services).await.unwrap();

    let seen = seen.lock().unwrap();
    let setconf = &seen[1];
    assert!(setconf.starts_with("SETCONF HiddenServiceDir="));
    assert!(setconf.contains("/var/lib/oonib/collector"));
    assert!(setconf.contains("\"80 127.0.0.1:40002\""));
    let collector = setconf.find("collector").unwrap();
    let bouncer = setconf.find("bouncer").unwrap();
    assert!(collector < bouncer);
}

#[tokio::test]
async fn test_rejected_setconf_is_error() {
    let tmp = tempfile::tempdir().unwrap();
    let (addr, _) = fake_tor(true).await;
    let mut controller = TorController::connect(&addr.to_string(), &cookie(&tmp))
        .await
        .unwrap();

    let services = [HiddenServiceConfig {
        dir: PathBuf::from("/var/lib/oonib/collector"),
        public_port: 80,
        target: "127.0.0.1:40001".parse().unwrap(),
    }];
    let err = controller
        .configure_hidden_services(&services)
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("552"));
}

#[tokio::test]
async fn test_configure_multibyte_path() {
    let tmp = tempfile::tempdir().unwrap();
    let (addr, seen) = fake_tor(false).await;
    let mut controller = TorController::connect(&addr.to_string(), &cookie(&tmp))
        .await
        .unwrap();

    // Puts the 'é' across the 100th byte of the SETCONF line
    let dir = PathBuf::from(format!("/{}é/collector", "a".repeat(72)));
    let services = [HiddenServiceConfig {
        dir: dir.clone(),
        public_port: 80,
        target: "127.0.0.1:40001".parse().unwrap(),
    }];
    controller.configure_hidden_services(&services).await.unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen[1].contains(dir.to_str().unwrap()));
}

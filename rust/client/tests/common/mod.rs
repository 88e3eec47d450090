//! Scriptable stand-in for the authority, served by warp on an ephemeral
//! port.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parlor_client::{ClientConfig, RemoteActionClient, SessionRegistry};
use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::Filter;

#[derive(Debug, Clone)]
struct Scripted {
    status: StatusCode,
    body: Value,
    delay: Duration,
}

#[derive(Debug, Default)]
struct MockState {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<(String, Value)>>,
    balance: Mutex<f64>,
    history: Mutex<Vec<Value>>,
}

pub struct MockAuthority {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockAuthority {
    pub async fn start(balance: f64) -> Self {
        let state = Arc::new(MockState::default());
        *state.balance.lock().unwrap() = balance;

        let with_state = {
            let state = Arc::clone(&state);
            warp::any().map(move || Arc::clone(&state))
        };

        let play = warp::post()
            .and(warp::path!("api" / "play" / String))
            .and(warp::body::json())
            .and(with_state.clone())
            .then(|slug: String, body: Value, state: Arc<MockState>| async move {
                state.requests.lock().unwrap().push((slug.clone(), body));
                let next = state
                    .scripts
                    .lock()
                    .unwrap()
                    .get_mut(&slug)
                    .and_then(VecDeque::pop_front);
                let scripted = next.unwrap_or(Scripted {
                    status: StatusCode::BAD_REQUEST,
                    body: json!({ "error": format!("nothing scripted for {slug}") }),
                    delay: Duration::ZERO,
                });
                if !scripted.delay.is_zero() {
                    tokio::time::sleep(scripted.delay).await;
                }
                warp::reply::with_status(warp::reply::json(&scripted.body), scripted.status)
            });

        let balance = warp::get()
            .and(warp::path!("api" / "balance"))
            .and(with_state.clone())
            .map(|state: Arc<MockState>| {
                let balance = *state.balance.lock().unwrap();
                warp::reply::json(&json!({ "balance": balance }))
            });

        let history = warp::get()
            .and(warp::path!("api" / "history"))
            .and(with_state)
            .map(|state: Arc<MockState>| {
                let history = state.history.lock().unwrap().clone();
                warp::reply::json(&history)
            });

        let routes = play.or(balance).or(history);
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Short holds and frames so flows finish quickly.
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url(),
            request_timeout_ms: 2_000,
            frame_interval_ms: 5,
            settle_hold_ms: 50,
            limbo_hold_ms: 80,
            history_limit: 50,
        }
    }

    pub fn registry(&self) -> SessionRegistry {
        let config = self.config();
        let remote = RemoteActionClient::from_config(&config).expect("remote client");
        SessionRegistry::new(remote, &config)
    }

    pub fn reply(&self, slug: &str, body: Value) {
        self.push(slug, StatusCode::OK, body, Duration::ZERO);
    }

    pub fn reply_status(&self, slug: &str, status: StatusCode, body: Value) {
        self.push(slug, status, body, Duration::ZERO);
    }

    pub fn reply_after(&self, slug: &str, delay: Duration, body: Value) {
        self.push(slug, StatusCode::OK, body, delay);
    }

    pub fn set_balance(&self, balance: f64) {
        *self.state.balance.lock().unwrap() = balance;
    }

    /// Most recent first, as the authority serves it.
    pub fn set_history(&self, items: Vec<Value>) {
        *self.state.history.lock().unwrap() = items;
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn actions(&self, slug: &str) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|(game, _)| game == slug)
            .filter_map(|(_, body)| body["action"].as_str().map(str::to_string))
            .collect()
    }

    fn push(&self, slug: &str, status: StatusCode, body: Value, delay: Duration) {
        self.state
            .scripts
            .lock()
            .unwrap()
            .entry(slug.to_string())
            .or_default()
            .push_back(Scripted {
                status,
                body,
                delay,
            });
    }
}

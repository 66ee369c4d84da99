//! In-process stand-in for the timetable provider.
//!
//! Serves `/<school>/wplan/wdatenk/<file>` behind basic auth from an in-memory
//! file table. Runs on its own thread and runtime so both async tests and
//! blocking CLI tests can talk to it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::oneshot;

pub const SCHOOL_ID: i64 = 10000000;
pub const USERNAME: &str = "schueler";
pub const PASSWORD: &str = "secret";

#[derive(Clone)]
enum Reply {
    Body(String),
    Status(StatusCode),
}

type Files = Arc<Mutex<HashMap<String, Reply>>>;

pub struct Provider {
    pub base_url: String,
    files: Files,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Provider {
    pub fn start() -> Self {
        let files: Files = Arc::new(Mutex::new(HashMap::new()));

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.set_nonblocking(true).expect("nonblocking");
        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));

        let app = Router::new()
            .route("/{school}/wplan/wdatenk/{file}", get(serve_file))
            .with_state(files.clone());

        let (tx, rx) = oneshot::channel::<()>();
        let thread = std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("build runtime");
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).expect("listener");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = rx.await;
                    })
                    .await
                    .expect("serve");
            });
        });

        let provider = Self {
            base_url,
            files,
            shutdown: Some(tx),
            thread: Some(thread),
        };
        provider.put(BASE_DATA_FILE, BASE_DATA);
        provider
    }

    pub fn put(&self, file: &str, body: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(file.to_string(), Reply::Body(body.to_string()));
    }

    pub fn fail(&self, file: &str, status: StatusCode) {
        self.files
            .lock()
            .unwrap()
            .insert(file.to_string(), Reply::Status(status));
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        // Detach: idle keep-alive connections may hold the server open.
        drop(self.thread.take());
    }
}

async fn serve_file(
    State(files): State<Files>,
    Path((school, file)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if school != SCHOOL_ID.to_string() {
        return StatusCode::NOT_FOUND.into_response();
    }
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"stundenplan24\"")],
        )
            .into_response();
    }

    let reply = files.lock().unwrap().get(&file).cloned();
    match reply {
        Some(Reply::Body(body)) => ([(header::CONTENT_TYPE, "text/xml")], body).into_response(),
        Some(Reply::Status(status)) => status.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded) else {
        return false;
    };
    decoded == format!("{USERNAME}:{PASSWORD}").as_bytes()
}

pub const BASE_DATA_FILE: &str = "SPlanKl_Basis.xml";

pub const BASE_DATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<splan>
  <Kopf>
    <planart>K</planart>
    <schulname>Testschule am See</schulname>
  </Kopf>
  <Basisdaten><BaTageProWoche>5</BaTageProWoche></Basisdaten>
  <Klassen>
    <Kl>
      <Kurz>5a</Kurz>
      <Unterricht>
        <Ue><UeNr UeLe="MUE" UeFa="MA">1</UeNr></Ue>
        <Ue><UeNr UeLe="SCH" UeFa="DE">2</UeNr></Ue>
      </Unterricht>
    </Kl>
    <Kl>
      <Kurz>5b</Kurz>
      <Unterricht>
        <Ue><UeNr UeLe="KRA" UeFa="EN">3</UeNr></Ue>
      </Unterricht>
    </Kl>
  </Klassen>
  <Raeume>
    <Ra>101</Ra>
    <Ra>102</Ra>
    <Ra>204</Ra>
  </Raeume>
</splan>"#;

/// File name the provider uses for the plan of 2024-03-04.
pub const PLAN_FILE: &str = "WPlanKl_2024304.xml";

/// A plan for 2024-03-04 stamped `stamp` ("dd.mm.yyyy, hh:mm"); lesson 1 of
/// 5a is held in `room`.
pub fn plan_xml(stamp: &str, room: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<VpMobil>
  <Kopf>
    <planart>K</planart>
    <zeitstempel>{stamp}</zeitstempel>
    <datei>PlanKl20240304.xml</datei>
    <tageprowoche>5</tageprowoche>
  </Kopf>
  <FreieTage><ft>240325</ft></FreieTage>
  <Klassen>
    <Kl>
      <Kurz>5a</Kurz>
      <Pl>
        <Std><St>1</St><Beginn>7:30</Beginn><Ende>8:15</Ende><Fa>MA</Fa><Le>MUE</Le><Ra>{room}</Ra><Nr>1</Nr><If/></Std>
        <Std><St>2</St><Beginn>8:25</Beginn><Ende>9:10</Ende><Fa FaAe="FaGeaendert">---</Fa><Le/><Ra/><If>Ausfall</If></Std>
      </Pl>
    </Kl>
    <Kl>
      <Kurz>5b</Kurz>
      <Pl>
        <Std><St>1</St><Fa>EN</Fa><Le LeAe="LeGeaendert">MUE</Le><Ra>102</Ra><If>für Herrn Kraus</If></Std>
      </Pl>
    </Kl>
  </Klassen>
  <ZusatzInfo>
    <ZiZeile>Elternabend 18 Uhr</ZiZeile>
  </ZusatzInfo>
</VpMobil>"#
    )
}

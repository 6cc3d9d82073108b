use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use crate::server::AppState;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ConnectForm {
    pub ssid: Option<String>,
    pub password: Option<String>,
}

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>WiFi Manager</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        body { font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px; }
        .container { background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        h1 { text-align: center; color: #333; }
        .form-group { margin-bottom: 15px; }
        label { display: block; margin-bottom: 5px; font-weight: bold; }
        input { width: 100%; padding: 8px; border: 1px solid #ddd; border-radius: 4px; box-sizing: border-box; }
        button { background: #007bff; color: white; border: none; padding: 10px 15px; border-radius: 4px; width: 100%; font-size: 16px; margin-top: 10px; }
        .instructions { background: #e3f2fd; padding: 15px; border-radius: 4px; margin-bottom: 20px; }
        .status { text-align: center; padding: 10px; margin: 10px 0; border-radius: 4px; }
        .status.error { background: #f8d7da; color: #721c24; }
    </style>
</head>
<body>
    <div class="container">
        <h1>WiFi Manager</h1>
        <div class="instructions">
            <p><strong>Connect to this network:</strong></p>
            <p>SSID: <strong>{{ap_ssid}}</strong> (Open Network)</p>
            <p>Then visit: <strong>http://{{ap_ip}}</strong></p>
        </div>
{{error_block}}        <form method="POST" action="/connect">
            <div class="form-group">
                <label for="ssid">WiFi SSID:</label>
                <input type="text" id="ssid" name="ssid" placeholder="Enter your WiFi network name" required>
            </div>
            <div class="form-group">
                <label for="password">WiFi Password:</label>
                <input type="password" id="password" name="password" placeholder="Enter your WiFi password" required>
            </div>
            <button type="submit">Connect</button>
        </form>
        <p style="text-align: center; margin-top: 30px;">
            <strong>To stop this program:</strong><br>
            Press Ctrl+C in the terminal window
        </p>
    </div>
</body>
</html>
"#;

const CONNECTING_PAGE: &str = "<h2>Connecting...</h2><p>You may lose connection temporarily</p>";

pub fn render_index(ap_ssid: &str, ap_ip: &str, error: Option<&str>) -> String {
    let error_block = match error {
        Some(error) => format!(
            "        <div class=\"status error\">\n            <p>❌ {}</p>\n        </div>\n",
            escape_html(error)
        ),
        None => String::new(),
    };
    INDEX_TEMPLATE
        .replace("{{ap_ssid}}", &escape_html(ap_ssid))
        .replace("{{ap_ip}}", &escape_html(ap_ip))
        .replace("{{error_block}}", &error_block)
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let settings = state.orchestrator.settings();
    let error = state.last_error();
    Html(render_index(&settings.ap_ssid, &settings.ap_ip, error.as_deref()))
}

/// Accept credentials and start the connect attempt in the background.
/// The client usually loses the access point it is talking through, so a
/// failure only shows up on the form once the access point is back.
pub async fn connect(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ConnectForm>,
) -> Response {
    let (ssid, password) = match (form.ssid, form.password) {
        (Some(ssid), Some(password)) if !ssid.is_empty() && !password.is_empty() => (ssid, password),
        _ => return Redirect::to("/").into_response(),
    };

    if state.orchestrator.shutdown().is_set() {
        return (StatusCode::SERVICE_UNAVAILABLE, "Shutting down").into_response();
    }

    state.set_last_error(None);
    tokio::spawn(async move {
        match state.orchestrator.attempt_client_connect(&ssid, &password).await {
            Ok(()) => {}
            Err(crate::Error::ShuttingDown) => {}
            Err(e) => {
                tracing::warn!("Connection attempt for {} ended with: {}", ssid, e);
                state.set_last_error(Some(format!("Could not connect to {}: {}", ssid, e)));
            }
        }
    });

    Html(CONNECTING_PAGE).into_response()
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "device": state.orchestrator.mode(),
        "shutting_down": state.orchestrator.shutdown().is_set(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WifiConfig;
    use crate::wifi::command::testing::RecordingRunner;
    use crate::wifi::{CommandOutput, Delays, Orchestrator, ShutdownFlag, WifiSettings};
    use std::time::Duration;

    fn state(runner: Arc<RecordingRunner>, dir: &tempfile::TempDir) -> Arc<AppState> {
        let mut settings = WifiSettings::from(&WifiConfig::default());
        settings.hostapd_conf = dir.path().join("hostapd.conf");
        settings.dnsmasq_conf = dir.path().join("dnsmasq.conf");
        settings.ip_forward_path = dir.path().join("ip_forward");
        let orchestrator = Orchestrator::new(settings, runner, ShutdownFlag::new())
            .with_delays(Delays::none());
        Arc::new(AppState::new(Arc::new(orchestrator)))
    }

    fn form(ssid: Option<&str>, password: Option<&str>) -> Form<ConnectForm> {
        Form(ConnectForm {
            ssid: ssid.map(str::to_string),
            password: password.map(str::to_string),
        })
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_render_index_escapes_values() {
        let html = render_index("<Cafe & Bar>", "192.168.42.1", None);
        assert!(html.contains("&lt;Cafe &amp; Bar&gt;"));
        assert!(html.contains("http://192.168.42.1"));
        assert!(html.contains(r#"action="/connect""#));
        assert!(html.contains("Press Ctrl+C in the terminal window"));
        assert!(!html.contains("status error"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_render_index_shows_error_block() {
        let html = render_index("WiFi-Manager", "192.168.42.1", Some("Could not connect to <Home>"));
        assert!(html.contains(r#"<div class="status error">"#));
        assert!(html.contains("Could not connect to &lt;Home&gt;"));
    }

    #[tokio::test]
    async fn test_index_shows_access_point() {
        let dir = tempfile::tempdir().unwrap();
        let Html(page) = index(State(state(Arc::new(RecordingRunner::succeeding()), &dir))).await;
        assert!(page.contains("WiFi-Manager"));
        assert!(page.contains("192.168.42.1"));
    }

    #[tokio::test]
    async fn test_missing_fields_redirect_home() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::succeeding());
        let state = state(runner.clone(), &dir);

        for f in [form(Some("Home"), None), form(None, Some("pw")), form(Some(""), Some("pw"))] {
            let response = connect(State(state.clone()), f).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(response.headers()["location"], "/");
        }
        tokio::task::yield_now().await;
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_submission_acknowledges_and_connects_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::succeeding());
        let state = state(runner.clone(), &dir);

        let response = connect(State(state.clone()), form(Some("Home"), Some("secret"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Connecting..."));

        let expected = "nmcli device wifi connect Home password secret ifname wlan0";
        for _ in 0..100 {
            if runner.count(expected) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(runner.count(expected), 1);
    }

    #[tokio::test]
    async fn test_failed_attempt_shows_on_form() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::with(|cmd| {
            if cmd.program == "nmcli" && cmd.args.get(2).map(String::as_str) == Some("connect") {
                Ok(CommandOutput::failed(10, "No network with SSID 'Home' found."))
            } else {
                Ok(CommandOutput::ok())
            }
        }));
        let state = state(runner, &dir);

        connect(State(state.clone()), form(Some("Home"), Some("secret"))).await;
        for _ in 0..100 {
            if state.last_error().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let Html(page) = index(State(state.clone())).await;
        assert!(page.contains("Could not connect to Home"));
        assert!(page.contains("No network with SSID"));
    }

    #[tokio::test]
    async fn test_submission_rejected_during_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::succeeding());
        let state = state(runner.clone(), &dir);
        state.orchestrator.shutdown().trigger();

        let response = connect(State(state), form(Some("Home"), Some("secret"))).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        tokio::task::yield_now().await;
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_status_reports_mode() {
        let dir = tempfile::tempdir().unwrap();
        let Json(value) = status(State(state(Arc::new(RecordingRunner::succeeding()), &dir))).await;
        assert_eq!(value["device"]["mode"], "unconfigured");
        assert_eq!(value["shutting_down"], false);
    }
}

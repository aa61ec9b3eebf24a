//! Embedded HTML pages
//!
//! Both pages open the frame stream websocket and render every binary
//! message as a JPEG blob.

use axum::extract::State;
use axum::response::Html;

use super::connection::ServerState;

const BANNER: &str = "perchcam web interface";

pub(crate) async fn index() -> &'static str {
    BANNER
}

pub(crate) async fn setup_preview(State(state): State<ServerState>) -> Html<String> {
    Html(render_viewer("Camera Setup Preview", "camera-feed", &state.ws_path))
}

pub(crate) async fn live_monitor(State(state): State<ServerState>) -> Html<String> {
    Html(render_viewer("Live Monitor", "live-feed", &state.ws_path))
}

fn render_viewer(title: &str, image_id: &str, ws_path: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title}</title>
</head>
<body>
  <h1>{title}</h1>
  <p>Status: <span id="status">Connecting...</span></p>
  <img id="{image_id}" alt="camera feed">
  <script>
    (function () {{
      const ws = new WebSocket('ws://' + window.location.host + '{ws_path}');
      ws.binaryType = 'blob';
      const img = document.getElementById('{image_id}');
      const status = document.getElementById('status');
      let previous = null;

      ws.onopen = () => {{ status.textContent = 'Connected'; }};
      ws.onmessage = (evt) => {{
        const blob = new Blob([evt.data], {{ type: 'image/jpeg' }});
        const url = URL.createObjectURL(blob);
        img.src = url;
        if (previous) {{ URL.revokeObjectURL(previous); }}
        previous = url;
      }};
      ws.onclose = () => {{ status.textContent = 'Disconnected'; }};
      ws.onerror = () => {{ status.textContent = 'Error Connecting'; }};
    }})();
  </script>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_uses_route_and_image_id() {
        let page = render_viewer("Live Monitor", "live-feed", "/ws/camera");

        assert!(page.contains("<title>Live Monitor</title>"));
        assert!(page.contains("id=\"live-feed\""));
        assert!(page.contains("window.location.host + '/ws/camera'"));
    }
}

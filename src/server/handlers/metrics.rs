use crate::server::state::AppState;
use axum::extract::State;

/// Prometheus exposition endpoint.
pub async fn render_metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

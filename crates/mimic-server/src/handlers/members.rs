//! `GET /teams/members` — the roster as a raw array.

use axum::Json;
use axum::extract::State;

use mimic_types::TeamMember;

use crate::ServerContext;

pub async fn members(State(ctx): State<ServerContext>) -> Json<Vec<TeamMember>> {
    let roster: Vec<TeamMember> = ctx
        .corpus
        .developers_list()
        .iter()
        .map(TeamMember::from)
        .collect();
    Json(roster)
}

pub mod conversations;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod presence;
pub mod profiles;
pub mod reactions;
pub mod receipts;
pub mod state;
pub mod typing;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use serde_json::json;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

/// All routes. Everything except `/health` sits behind bearer auth.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/conversations", get(conversations::list_conversations))
        .route("/conversations/search", get(conversations::search_conversations))
        .route("/conversations/direct", post(conversations::create_direct))
        .route("/conversations/group", post(conversations::create_group))
        .route(
            "/conversations/{conversation_id}",
            get(conversations::get_conversation)
                .patch(conversations::update_conversation)
                .delete(conversations::delete_conversation),
        )
        .route("/conversations/{conversation_id}/participants", post(conversations::add_participant))
        .route(
            "/conversations/{conversation_id}/participants/{user_id}",
            delete(conversations::remove_participant),
        )
        .route("/conversations/{conversation_id}/mute", put(conversations::mute))
        .route(
            "/conversations/{conversation_id}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route("/conversations/{conversation_id}/messages/search", get(messages::search_messages))
        .route("/conversations/{conversation_id}/pinned", get(messages::pinned_messages))
        .route("/conversations/{conversation_id}/read", post(receipts::mark_read))
        .route("/conversations/{conversation_id}/unread", get(receipts::unread_count))
        .route(
            "/conversations/{conversation_id}/typing",
            put(typing::set_typing).get(typing::currently_typing),
        )
        .route(
            "/messages/{message_id}",
            get(messages::get_message)
                .patch(messages::edit_message)
                .delete(messages::delete_message),
        )
        .route("/messages/{message_id}/forward", post(messages::forward_message))
        .route(
            "/messages/{message_id}/pin",
            put(messages::pin_message).delete(messages::unpin_message),
        )
        .route("/messages/{message_id}/reads", get(receipts::read_by))
        .route(
            "/messages/{message_id}/reactions",
            post(reactions::toggle_reaction).get(reactions::list_reactions),
        )
        .route("/profiles/me", put(profiles::upsert_own_profile))
        .route("/presence", put(presence::update_presence))
        .route("/presence/lookup", post(presence::lookup_presence))
        .route("/presence/{user_id}", get(presence::get_presence))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .merge(protected)
}

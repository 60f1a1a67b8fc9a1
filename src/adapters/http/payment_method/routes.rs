use axum::{
    routing::{delete, get, put},
    Router,
};

use super::super::state::AppState;
use super::handlers::{
    add_payment_method, delete_payment_method, list_payment_methods, set_default_payment_method,
};

pub fn payment_method_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/payment-methods",
            get(list_payment_methods).post(add_payment_method),
        )
        .route("/payment-methods/:id", delete(delete_payment_method))
        .route("/payment-methods/:id/default", put(set_default_payment_method))
}

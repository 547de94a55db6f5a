// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::Role,
    services::{
        applications::{
            ApplicantSummary, ApplicationWithApplicant, ReviewApplicationRequest, ReviewVerdict,
            SubmitApplicationRequest,
        },
        gallery::{
            GalleryImageView, ImportRequest, ImportSummary, UploadImageRequest,
            UploadImageResponse,
        },
        payments::CheckoutResponse,
        reconciliation::WebhookOutcome,
        users::{UpdateGameHandleRequest, UpdateGreetingRequest},
        whitelist::ToggleWhitelistRequest,
    },
    providers::{OnlinePlayer, PlayerCounts, ServerStatus},
    state::AppState,
    storage::{
        ApplicationStatus, ImageReaction, PaymentStatus, StoredApplication, StoredGalleryImage,
        StoredPayment, StoredUser,
    },
};

pub mod admin;
pub mod applications;
pub mod gallery;
pub mod health;
pub mod payments;
pub mod server;
pub mod users;
pub mod webhooks;

/// Upload bodies carry base64 images of up to 10 MiB.
const UPLOAD_BODY_LIMIT: usize = 16 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/users/me", get(users::get_current_user))
        .route("/users/me/greeting", put(users::update_greeting))
        .route("/users/me/game-handle", put(users::update_game_handle))
        .route("/applications", post(applications::submit_application))
        .route("/applications/me", get(applications::get_my_application))
        .route("/payments/checkout", post(payments::create_checkout))
        .route("/payments/history", get(payments::payment_history))
        .route(
            "/gallery",
            get(gallery::list_gallery)
                .post(gallery::upload_image)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/gallery/mine", get(gallery::my_gallery))
        .route("/server/status", get(server::get_server_status))
        .route("/gallery/{image_id}", delete(gallery::delete_image))
        .route("/admin/applications", get(admin::list_applications))
        .route(
            "/admin/applications/{application_id}/review",
            post(admin::review_application),
        )
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}/whitelist", put(admin::set_whitelist))
        .route("/admin/gallery/import", post(admin::import_gallery));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        users::get_current_user,
        users::update_greeting,
        users::update_game_handle,
        applications::submit_application,
        applications::get_my_application,
        payments::create_checkout,
        payments::payment_history,
        gallery::list_gallery,
        gallery::my_gallery,
        gallery::upload_image,
        gallery::delete_image,
        admin::list_applications,
        admin::review_application,
        admin::list_users,
        admin::set_whitelist,
        admin::import_gallery,
        server::get_server_status,
        webhooks::stripe_webhook
    ),
    components(
        schemas(
            Role,
            StoredUser,
            StoredApplication,
            ApplicationStatus,
            StoredPayment,
            PaymentStatus,
            StoredGalleryImage,
            ImageReaction,
            SubmitApplicationRequest,
            ReviewApplicationRequest,
            ReviewVerdict,
            ApplicantSummary,
            ApplicationWithApplicant,
            ToggleWhitelistRequest,
            UpdateGreetingRequest,
            UpdateGameHandleRequest,
            CheckoutResponse,
            GalleryImageView,
            UploadImageRequest,
            UploadImageResponse,
            ImportRequest,
            ImportSummary,
            WebhookOutcome,
            ServerStatus,
            PlayerCounts,
            OnlinePlayer,
            applications::ApplicationResponse,
            admin::ReviewResponse,
            admin::WhitelistResponse,
            admin::AdminUserListResponse,
            gallery::DeleteImageResponse,
            webhooks::WebhookAck,
            webhooks::TestEventAck,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Users", description = "Player profile"),
        (name = "Applications", description = "Whitelist applications"),
        (name = "Payments", description = "Checkout issuance and history"),
        (name = "Gallery", description = "Community screenshots"),
        (name = "Admin", description = "Review, whitelist override and imports"),
        (name = "Server", description = "Live game server status"),
        (name = "Webhooks", description = "Payment gateway notifications")
    )
)]
struct ApiDoc;

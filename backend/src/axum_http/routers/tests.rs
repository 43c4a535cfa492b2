use std::sync::Arc;

use axum::{
    Extension, Router,
    http::{HeaderValue, StatusCode, header::AUTHORIZATION},
};
use axum_test::{TestResponse, TestServer};
use chrono::Utc;
use crates::domain::{entities::accounts::AccountEntity, value_objects::users::CREDENTIAL_PROVIDER};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    auth::{SessionKeys, passwords::hash_password},
    axum_http::routers,
    usecases::{
        auth_flows::AuthFlowUseCase,
        email_change::EmailChangeUseCase,
        registration::RegistrationUseCase,
        test_support::{
            InMemoryUsers, InMemoryVerifications, SentCodes, recording_email_sender, sample_user,
        },
        verification_ledger::VerificationLedger,
    },
};

const SECRET: &str = "router-tests-secret-that-is-long-enough";

struct App {
    server: TestServer,
    users: Arc<InMemoryUsers>,
    verifications: Arc<InMemoryVerifications>,
    sent: SentCodes,
}

fn app() -> App {
    let verifications = Arc::new(InMemoryVerifications::default());
    let users = Arc::new(InMemoryUsers::new(Arc::clone(&verifications)));
    let (sender, sent) = recording_email_sender();
    let ledger = Arc::new(VerificationLedger::new(Arc::clone(&verifications), sender));
    let keys = Arc::new(SessionKeys::new(SECRET, 600));

    let auth_flows = Arc::new(AuthFlowUseCase::new(
        Arc::clone(&users),
        Arc::clone(&ledger),
        Arc::clone(&keys),
    ));
    let registration = Arc::new(RegistrationUseCase::new(Arc::clone(&users), Arc::clone(&ledger)));
    let email_change = Arc::new(EmailChangeUseCase::new(Arc::clone(&users), ledger));

    let router = Router::new()
        .nest("/auth/password", routers::password_auth::routes(Arc::clone(&auth_flows)))
        .nest("/auth/email", routers::email_auth::routes(Arc::clone(&auth_flows)))
        .nest("/auth/session", routers::session::routes(auth_flows))
        .nest(
            "/student-registration",
            routers::student_registration::routes(registration),
        )
        .nest("/account/email", routers::account_email::routes(email_change))
        .layer(Extension(keys));

    App {
        server: TestServer::new(router).unwrap(),
        users,
        verifications,
        sent,
    }
}

fn seed_password_user(app: &App, email: &str, username: &str, password: &str) {
    let user = sample_user(email, username);
    let account = AccountEntity {
        id: Uuid::new_v4(),
        user_id: user.id,
        provider_id: CREDENTIAL_PROVIDER.to_string(),
        account_id: user.email.clone(),
        password: Some(hash_password(password).unwrap()),
        created_at: Utc::now(),
    };
    app.users.seed(user, Some(account));
}

fn body(response: &TestResponse) -> Value {
    response.json::<Value>()
}

async fn access_token_for(app: &App, session_token: &str) -> String {
    let response = app
        .server
        .post("/auth/session")
        .json(&json!({ "sessionToken": session_token }))
        .await;
    response.assert_status_ok();
    body(&response)["accessToken"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn password_sign_in_over_http() {
    let app = app();
    seed_password_user(&app, "ada@learnhub.test", "ada", "correct-horse-battery");

    let response = app
        .server
        .post("/auth/password/send-otp")
        .json(&json!({ "identifier": "ada", "password": "correct-horse-battery" }))
        .await;
    response.assert_status_ok();
    assert_eq!(body(&response)["email"], "ada@learnhub.test");

    let code = app.sent.last_code().unwrap();
    let response = app
        .server
        .post("/auth/password/verify")
        .json(&json!({ "email": "ada@learnhub.test", "otp": code }))
        .await;
    response.assert_status_ok();
    let verified = body(&response);
    assert_eq!(verified["status"], "success");
    let session_token = verified["sessionToken"].as_str().unwrap().to_string();

    let access_token = access_token_for(&app, &session_token).await;
    assert!(!access_token.is_empty());

    // A bridge token is single use.
    let replay = app
        .server
        .post("/auth/session")
        .json(&json!({ "sessionToken": session_token }))
        .await;
    replay.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = app();
    seed_password_user(&app, "ada@learnhub.test", "ada", "correct-horse-battery");

    let response = app
        .server
        .post("/auth/password/send-otp")
        .json(&json!({ "identifier": "ada@learnhub.test", "password": "nope-nope-nope" }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(body(&response)["code"], "INVALID_CREDENTIALS");
    assert_eq!(app.sent.count(), 0);
}

#[tokio::test]
async fn malformed_otp_is_a_validation_error() {
    let app = app();

    let response = app
        .server
        .post("/auth/password/verify")
        .json(&json!({ "email": "not-an-email", "otp": "12" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let errors = body(&response);
    assert_eq!(errors["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = errors["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email", "otp"]);
}

#[tokio::test]
async fn missing_body_fields_are_reported() {
    let app = app();

    let response = app
        .server
        .post("/auth/email/send-otp")
        .json(&json!({ "address": "ada@learnhub.test" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(body(&response)["errors"][0]["field"], "body");
}

#[tokio::test]
async fn email_sign_in_creates_account() {
    let app = app();

    app.server
        .post("/auth/email/send-otp")
        .json(&json!({ "email": "New@Learnhub.test" }))
        .await
        .assert_status_ok();
    let code = app.sent.last_code().unwrap();

    let response = app
        .server
        .post("/auth/email/verify")
        .json(&json!({ "email": "new@learnhub.test", "otp": code }))
        .await;

    response.assert_status_ok();
    let signed_in = body(&response);
    assert_eq!(signed_in["email"], "new@learnhub.test");
    assert!(signed_in["sessionToken"].as_str().is_some());
    assert_eq!(app.users.user_count(), 1);
}

#[tokio::test]
async fn registration_then_duplicate_verify() {
    let app = app();

    let response = app
        .server
        .post("/student-registration/send-otp")
        .json(&json!({
            "firstName": "Grace",
            "lastName": "Hopper",
            "username": "grace",
            "email": "grace@learnhub.test",
            "password": "cobol-forever-1959",
        }))
        .await;
    response.assert_status_ok();
    let code = app.sent.last_code().unwrap();

    let verify = json!({ "email": "grace@learnhub.test", "otp": code });
    app.server
        .post("/student-registration/verify")
        .json(&verify)
        .await
        .assert_status_ok();

    let again = app.server.post("/student-registration/verify").json(&verify).await;

    again.assert_status(StatusCode::CONFLICT);
    assert_eq!(body(&again)["code"], "ALREADY_EXISTS");
    assert_eq!(app.users.user_count(), 1);
    assert_eq!(app.users.account_count(), 1);
    assert_eq!(app.verifications.total(), 0);
}

#[tokio::test]
async fn resend_without_pending_code_is_not_found() {
    let app = app();

    let response = app
        .server
        .post("/student-registration/resend")
        .json(&json!({ "email": "ghost@learnhub.test" }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(body(&response)["code"], "OTP_NOT_FOUND");
}

#[tokio::test]
async fn email_change_requires_session() {
    let app = app();

    let response = app
        .server
        .post("/account/email/send-otp")
        .json(&json!({ "newEmail": "other@learnhub.test" }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn email_change_with_session() {
    let app = app();
    seed_password_user(&app, "ada@learnhub.test", "ada", "correct-horse-battery");

    app.server
        .post("/auth/password/send-otp")
        .json(&json!({ "identifier": "ada", "password": "correct-horse-battery" }))
        .await
        .assert_status_ok();
    let code = app.sent.last_code().unwrap();
    let verified = app
        .server
        .post("/auth/password/verify")
        .json(&json!({ "email": "ada@learnhub.test", "otp": code }))
        .await;
    let session_token = body(&verified)["sessionToken"].as_str().unwrap().to_string();
    let access_token = access_token_for(&app, &session_token).await;
    let bearer = HeaderValue::from_str(&format!("Bearer {access_token}")).unwrap();

    app.server
        .post("/account/email/send-otp")
        .add_header(AUTHORIZATION, bearer.clone())
        .json(&json!({ "newEmail": "ada.l@learnhub.test" }))
        .await
        .assert_status_ok();
    let code = app.sent.last_code().unwrap();

    let response = app
        .server
        .post("/account/email/verify")
        .add_header(AUTHORIZATION, bearer)
        .json(&json!({ "newEmail": "ada.l@learnhub.test", "otp": code }))
        .await;

    response.assert_status_ok();
    assert_eq!(body(&response)["email"], "ada.l@learnhub.test");
}

mod subscription_routes {
    use super::*;
    use crates::{
        domain::{
            entities::user_subscriptions::UserSubscriptionEntity,
            repositories::{
                subscription_history::MockSubscriptionHistoryRepository,
                subscription_intents::MockSubscriptionIntentRepository,
                subscription_plans::MockPlanRepository,
                user_subscriptions::MockUserSubscriptionRepository, users::MockUserRepository,
            },
            value_objects::{enums::user_roles::UserRole, users::UserSummary},
        },
        payments::MockPaymentGateway,
    };

    use crate::usecases::{rate_limiter::FixedWindowRateLimiter, subscriptions::SubscriptionUseCase};

    struct Mocks {
        plans: MockPlanRepository,
        subscriptions: MockUserSubscriptionRepository,
        intents: MockSubscriptionIntentRepository,
        gateway: MockPaymentGateway,
    }

    fn server(mocks: Mocks, keys: Arc<SessionKeys>) -> TestServer {
        let usecase = Arc::new(SubscriptionUseCase::new(
            Arc::new(mocks.plans),
            Arc::new(mocks.subscriptions),
            Arc::new(MockSubscriptionHistoryRepository::new()),
            Arc::new(mocks.intents),
            Arc::new(MockUserRepository::new()),
            Arc::new(mocks.gateway),
            Arc::new(FixedWindowRateLimiter::default()),
        ));
        let router = Router::new()
            .nest("/subscription", routers::subscriptions::routes(usecase))
            .layer(Extension(keys));
        TestServer::new(router).unwrap()
    }

    fn mocks() -> Mocks {
        Mocks {
            plans: MockPlanRepository::new(),
            subscriptions: MockUserSubscriptionRepository::new(),
            intents: MockSubscriptionIntentRepository::new(),
            gateway: MockPaymentGateway::new(),
        }
    }

    fn bearer(keys: &SessionKeys, user_id: Uuid, role: UserRole) -> HeaderValue {
        let token = keys
            .issue(&UserSummary {
                id: user_id,
                email: "ada@learnhub.test".to_string(),
                username: "ada".to_string(),
                role,
            })
            .unwrap();
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }

    fn active(user_id: Uuid, plan_id: Uuid) -> UserSubscriptionEntity {
        let now = Utc::now();
        UserSubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            plan_id,
            status: "trial".to_string(),
            billing_cycle: "monthly".to_string(),
            stripe_subscription_id: None,
            auto_renew: true,
            cancelled_at: None,
            next_billing_date: Some(now + chrono::Duration::days(7)),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn admin_cancel_is_forbidden() {
        let keys = Arc::new(SessionKeys::new(SECRET, 600));
        let auth = bearer(&keys, Uuid::new_v4(), UserRole::SuperAdmin);

        let response = server(mocks(), Arc::clone(&keys))
            .post("/subscription/cancel")
            .add_header(AUTHORIZATION, auth)
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(body(&response)["code"], "SUBSCRIPTION_FORBIDDEN");
    }

    #[tokio::test]
    async fn cancel_reports_access_until() {
        let keys = Arc::new(SessionKeys::new(SECRET, 600));
        let user_id = Uuid::new_v4();
        let subscription = active(user_id, Uuid::new_v4());
        let mut mocks = mocks();

        mocks
            .subscriptions
            .expect_find_current_for_user()
            .returning(move |_| {
                let subscription = subscription.clone();
                Box::pin(async move { Ok(Some(subscription)) })
            });
        mocks
            .subscriptions
            .expect_apply_cancellation()
            .returning(|_, _, _, _| Box::pin(async { Ok(true) }));
        mocks
            .intents
            .expect_create()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        mocks
            .intents
            .expect_mark_status()
            .returning(|_, _, _| Box::pin(async { Ok(()) }));
        mocks.gateway.expect_cancel_subscription_at_period_end().never();

        let response = server(mocks, Arc::clone(&keys))
            .post("/subscription/cancel")
            .add_header(AUTHORIZATION, bearer(&keys, user_id, UserRole::Student))
            .await;

        response.assert_status_ok();
        let cancelled = body(&response);
        assert_eq!(cancelled["status"], "success");
        assert!(cancelled["accessUntil"].is_string());
        assert!(cancelled["cancelledAt"].is_string());
    }

    #[tokio::test]
    async fn upgrade_to_current_plan_is_rejected() {
        let keys = Arc::new(SessionKeys::new(SECRET, 600));
        let user_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();
        let subscription = active(user_id, plan_id);
        let mut mocks = mocks();

        mocks.plans.expect_find_active_plan_by_id().returning(|id| {
            Box::pin(async move {
                Ok(Some(crates::domain::entities::subscription_plans::PlanEntity {
                    id,
                    slug: "pro".to_string(),
                    name: "Pro".to_string(),
                    price_monthly_minor: 1500,
                    price_yearly_minor: 15000,
                    stripe_price_id_monthly: Some("price_m".to_string()),
                    stripe_price_id_yearly: None,
                    is_active: true,
                    features: Default::default(),
                }))
            })
        });
        mocks
            .subscriptions
            .expect_find_current_for_user()
            .returning(move |_| {
                let subscription = subscription.clone();
                Box::pin(async move { Ok(Some(subscription)) })
            });
        mocks.gateway.expect_create_checkout_session().never();

        let response = server(mocks, Arc::clone(&keys))
            .post("/subscription/upgrade")
            .add_header(AUTHORIZATION, bearer(&keys, user_id, UserRole::Instructor))
            .json(&json!({ "planId": plan_id }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["code"], "ALREADY_SUBSCRIBED");
    }

    #[tokio::test]
    async fn upgrade_with_bad_plan_id_is_a_validation_error() {
        let keys = Arc::new(SessionKeys::new(SECRET, 600));

        let response = server(mocks(), Arc::clone(&keys))
            .post("/subscription/upgrade")
            .add_header(AUTHORIZATION, bearer(&keys, Uuid::new_v4(), UserRole::Student))
            .json(&json!({ "planId": "not-a-uuid" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["code"], "VALIDATION_ERROR");
    }
}

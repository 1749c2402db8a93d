use std::sync::Arc;

use futures::future::join_all;
use ticket_booking::configuration::{
    ApplicationSettings, DatabaseSettings, JwtSettings, PasswordSettings, RedisSettings, Settings,
};
use ticket_booking::directory::{InMemoryTicketDirectory, InMemoryUserDirectory};
use ticket_booking::domain::{Profile, Role};
use ticket_booking::error::ErrorKind;
use ticket_booking::startup::Services;
use ticket_booking::store::InMemoryKeyValueStore;

pub struct TestApp {
    pub services: Services,
    pub users: InMemoryUserDirectory,
    pub refresh_store: InMemoryKeyValueStore,
}

fn test_settings() -> Settings {
    Settings {
        database: DatabaseSettings {
            username: "postgres".to_string(),
            password: "password".to_string(),
            port: 5432,
            host: "127.0.0.1".to_string(),
            database_name: "ticket_booking".to_string(),
            max_connections: 5,
        },
        redis: RedisSettings {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "test:".to_string(),
        },
        application: ApplicationSettings {
            request_timeout_seconds: 5,
        },
        jwt: JwtSettings {
            secret: "integration-test-secret-at-least-32-chars".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "ticket-booking-app".to_string(),
        },
        password: PasswordSettings { bcrypt_cost: 4 },
    }
}

fn spawn_app() -> TestApp {
    let users = InMemoryUserDirectory::new();
    let refresh_store = InMemoryKeyValueStore::new();
    let services = Services::from_parts(
        &test_settings(),
        Arc::new(refresh_store.clone()),
        Arc::new(users.clone()),
        Arc::new(InMemoryTicketDirectory::new()),
    );

    TestApp {
        services,
        users,
        refresh_store,
    }
}

fn profile() -> Profile {
    Profile {
        name: "Ada".to_string(),
        surname: "Lovelace".to_string(),
        birthday: None,
    }
}

// --- Registration Tests ---

#[tokio::test]
async fn register_then_login_succeeds() {
    let app = spawn_app();
    let sessions = &app.services.sessions;

    let user = sessions
        .register("a@x.com", "secret1", profile(), &app.services.deadline())
        .await
        .expect("registration should succeed");
    assert_eq!(user.email, "a@x.com");

    let session = sessions
        .login("a@x.com", "secret1", &app.services.deadline())
        .await
        .expect("login should succeed");

    assert_eq!(session.user.id, user.id);
    assert_eq!(session.token_type, "Bearer");
    assert!(!session.access_token.is_empty());
    assert_eq!(session.refresh_token.len(), 64);
}

#[tokio::test]
async fn first_registered_user_is_manager() {
    let app = spawn_app();
    let sessions = &app.services.sessions;

    let first = sessions
        .register("first@x.com", "secret1", profile(), &app.services.deadline())
        .await
        .unwrap();
    let second = sessions
        .register("second@x.com", "secret1", profile(), &app.services.deadline())
        .await
        .unwrap();

    assert_eq!(first.role, Role::Manager);
    assert_eq!(second.role, Role::Attendee);
}

#[tokio::test]
async fn duplicate_email_is_already_exists() {
    let app = spawn_app();
    let sessions = &app.services.sessions;

    sessions
        .register("a@x.com", "secret1", profile(), &app.services.deadline())
        .await
        .unwrap();
    let err = sessions
        .register(" A@X.com ", "another1", profile(), &app.services.deadline())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(app.users.len(), 1);
}

// --- Login Tests ---

#[tokio::test]
async fn unknown_email_and_wrong_password_are_indistinguishable() {
    let app = spawn_app();
    let sessions = &app.services.sessions;
    sessions
        .register("a@x.com", "secret1", profile(), &app.services.deadline())
        .await
        .unwrap();

    let wrong_password = sessions
        .login("a@x.com", "wrong", &app.services.deadline())
        .await
        .unwrap_err();
    let unknown_email = sessions
        .login("nobody@x.com", "secret1", &app.services.deadline())
        .await
        .unwrap_err();

    assert_eq!(wrong_password.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(unknown_email.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(wrong_password.public_message(), unknown_email.public_message());
}

#[tokio::test]
async fn access_token_authenticates_the_user() {
    let app = spawn_app();
    let sessions = &app.services.sessions;
    let user = sessions
        .register("a@x.com", "secret1", profile(), &app.services.deadline())
        .await
        .unwrap();
    let session = sessions
        .login("a@x.com", "secret1", &app.services.deadline())
        .await
        .unwrap();

    let principal = sessions
        .authenticate(&session.access_token)
        .expect("fresh access token should verify");

    assert_eq!(principal.user_id, user.id);
    assert_eq!(principal.role, user.role);
}

// --- Refresh Tests ---

#[tokio::test]
async fn refresh_rotates_and_old_token_is_rejected() {
    let app = spawn_app();
    let sessions = &app.services.sessions;
    sessions
        .register("a@x.com", "secret1", profile(), &app.services.deadline())
        .await
        .unwrap();
    let first = sessions
        .login("a@x.com", "secret1", &app.services.deadline())
        .await
        .unwrap();

    let second = sessions
        .refresh(&first.refresh_token, &app.services.deadline())
        .await
        .expect("first refresh should succeed");
    assert_ne!(second.refresh_token, first.refresh_token);

    let err = sessions
        .refresh(&first.refresh_token, &app.services.deadline())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidToken);

    sessions
        .refresh(&second.refresh_token, &app.services.deadline())
        .await
        .expect("rotated token should still work");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refresh_has_one_winner() {
    let app = spawn_app();
    let sessions = &app.services.sessions;
    sessions
        .register("a@x.com", "secret1", profile(), &app.services.deadline())
        .await
        .unwrap();
    let session = sessions
        .login("a@x.com", "secret1", &app.services.deadline())
        .await
        .unwrap();

    let attempts = (0..8).map(|_| {
        let sessions = sessions.clone();
        let token = session.refresh_token.clone();
        let deadline = app.services.deadline();
        tokio::spawn(async move { sessions.refresh(&token, &deadline).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("refresh task panicked"))
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.kind() == ErrorKind::InvalidToken));
}

#[tokio::test]
async fn refresh_for_deleted_user_is_not_found() {
    let app = spawn_app();
    let sessions = &app.services.sessions;
    let user = sessions
        .register("a@x.com", "secret1", profile(), &app.services.deadline())
        .await
        .unwrap();
    let session = sessions
        .login("a@x.com", "secret1", &app.services.deadline())
        .await
        .unwrap();

    app.users.remove(user.id);

    let err = sessions
        .refresh(&session.refresh_token, &app.services.deadline())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    // The presented token was still revoked
    assert!(app.refresh_store.is_empty());
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = spawn_app();
    let sessions = &app.services.sessions;
    sessions
        .register("a@x.com", "secret1", profile(), &app.services.deadline())
        .await
        .unwrap();
    let session = sessions
        .login("a@x.com", "secret1", &app.services.deadline())
        .await
        .unwrap();

    sessions
        .logout(&session.refresh_token, &app.services.deadline())
        .await
        .unwrap();

    let err = sessions
        .refresh(&session.refresh_token, &app.services.deadline())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidToken);
}

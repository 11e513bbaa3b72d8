use std::time::Duration;

use uuid::Uuid;

use super::*;

fn gate() -> AuthGate {
    AuthGate::new(&AuthConfig {
        token_secret: "test-secret-key".into(),
        token_expiry: Duration::from_secs(3600),
    })
}

#[test]
fn issue_and_validate_round_trip() {
    let gate = gate();
    let subject = Uuid::new_v4();
    let (token, exp) = gate.issue(subject, "alice@example.com").unwrap();

    let claims = gate.validate(&token).unwrap();
    assert_eq!(claims.sub, subject);
    assert_eq!(claims.email, "alice@example.com");
    assert_eq!(claims.exp, exp);
    assert!(claims.exp > claims.iat);
}

#[test]
fn garbage_credential_rejected() {
    let gate = gate();
    assert!(matches!(gate.validate("not-a-token"), Err(AuthError::InvalidCredential)));
}

#[test]
fn wrong_secret_rejected() {
    let gate_a = gate();
    let gate_b = AuthGate::new(&AuthConfig {
        token_secret: "different-secret".into(),
        token_expiry: Duration::from_secs(3600),
    });

    let (token, _) = gate_a.issue(Uuid::new_v4(), "a@b.c").unwrap();
    assert!(gate_b.validate(&token).is_err());
}

#[test]
fn expired_credential_rejected() {
    let gate = gate();
    let now = Utc::now().timestamp();
    let stale = Claims { sub: Uuid::new_v4(), email: "a@b.c".into(), exp: now - 3600, iat: now - 7200 };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &stale,
        &EncodingKey::from_secret(b"test-secret-key"),
    )
    .unwrap();

    assert!(matches!(gate.validate(&token), Err(AuthError::InvalidCredential)));
}

#[test]
fn password_hash_and_verify() {
    let hash = hash_password("hunter2").unwrap();
    assert!(verify_password("hunter2", &hash));
    assert!(!verify_password("hunter3", &hash));
    assert!(!verify_password("hunter2", "not-a-phc-string"));
}

#[test]
fn bearer_token_extraction() {
    assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
    assert_eq!(bearer_token("bearer abc"), None);
    assert_eq!(bearer_token("Basic abc"), None);
    assert_eq!(bearer_token("Bearer "), None);
    assert_eq!(bearer_token("Bearer"), None);
}

#[test]
fn email_normalization() {
    assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    assert_eq!(normalize_email("bob@host"), "bob@host");
}

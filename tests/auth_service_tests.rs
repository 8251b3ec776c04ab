use chrono::Duration;
use dvota::{
    models::otp::{Otp, OtpType},
    services::{
        auth_service::{AuthServiceError, LoginRequest, SignupRequest, VerifiedOtp},
        otp_service::OtpError,
        token_service::TokenError,
    },
    test_utils::test_helpers::{self, TestApp},
};

async fn latest_code(app: &TestApp, user_id: i64, otp_type: OtpType) -> String {
    Otp::latest_for_user(&app.pool, user_id, otp_type)
        .await
        .unwrap()
        .expect("an OTP should have been issued")
        .code
}

fn login_request(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

/// Signs up and verifies an account, returning its id.
async fn registered_user(app: &TestApp, email: &str, password: &str) -> i64 {
    let auth = &app.state.auth_service;
    let user = auth
        .signup(SignupRequest {
            fullname: "Chi Nwosu".to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
        .unwrap();
    let code = latest_code(app, user.user_id, OtpType::Signup).await;
    auth.verify_otp(user.user_id, &code, OtpType::Signup)
        .await
        .unwrap();
    user.user_id
}

#[tokio::test]
async fn test_signup_requires_otp_before_login() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let auth = &app.state.auth_service;

    let user = auth
        .signup(SignupRequest {
            fullname: "Chi Nwosu".to_string(),
            email: "chi@example.com".to_string(),
            password: "password123".to_string(),
        })
        .await
        .unwrap();
    assert!(!user.email_verified);

    let result = auth.login(login_request("chi@example.com", "password123")).await;
    assert!(matches!(result, Err(AuthServiceError::EmailNotVerified)));

    let code = latest_code(&app, user.user_id, OtpType::Signup).await;
    let wrong = if code == "000000" { "111111" } else { "000000" };
    let result = auth.verify_otp(user.user_id, wrong, OtpType::Signup).await;
    assert!(matches!(
        result,
        Err(AuthServiceError::Otp(OtpError::InvalidOtp))
    ));

    match auth
        .verify_otp(user.user_id, &code, OtpType::Signup)
        .await
        .unwrap()
    {
        VerifiedOtp::Signup(verified) => assert!(verified.email_verified),
        other => panic!("unexpected verification result: {:?}", other),
    }

    let session = auth
        .login(login_request("chi@example.com", "password123"))
        .await
        .unwrap();
    assert_eq!(session.user.user_id, user.user_id);
    assert!(!session.access_token.is_empty());
    assert!(!session.refresh_token.is_empty());

    let resend = auth.resend_signup_otp("chi@example.com").await;
    assert!(matches!(resend, Err(AuthServiceError::AlreadyVerified)));
}

#[tokio::test]
async fn test_signup_duplicate_email() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    registered_user(&app, "dup@example.com", "password123").await;

    let result = app
        .state
        .auth_service
        .signup(SignupRequest {
            fullname: "Someone Else".to_string(),
            email: "dup@example.com".to_string(),
            password: "password123".to_string(),
        })
        .await;
    assert!(matches!(
        result,
        Err(AuthServiceError::User(
            dvota::services::user_service::UserServiceError::EmailTaken
        ))
    ));
}

#[tokio::test]
async fn test_signup_otp_expires() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let auth = &app.state.auth_service;

    let user = auth
        .signup(SignupRequest {
            fullname: "Late Comer".to_string(),
            email: "late@example.com".to_string(),
            password: "password123".to_string(),
        })
        .await
        .unwrap();
    let code = latest_code(&app, user.user_id, OtpType::Signup).await;

    app.clock.advance(Duration::minutes(11));
    let result = auth.verify_otp(user.user_id, &code, OtpType::Signup).await;
    assert!(matches!(
        result,
        Err(AuthServiceError::Otp(OtpError::OtpExpired))
    ));

    // A resent code replaces the expired one
    auth.resend_signup_otp("late@example.com").await.unwrap();
    let fresh = latest_code(&app, user.user_id, OtpType::Signup).await;
    let result = auth.verify_otp(user.user_id, &fresh, OtpType::Signup).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    registered_user(&app, "wrongpass@example.com", "correctpassword").await;

    let result = app
        .state
        .auth_service
        .login(login_request("wrongpass@example.com", "wrongpassword"))
        .await;
    assert!(matches!(result, Err(AuthServiceError::InvalidCredentials)));
}

#[tokio::test]
async fn test_forgot_and_reset_password() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let auth = &app.state.auth_service;
    let user_id = registered_user(&app, "forgetful@example.com", "password123").await;

    let returned_id = auth.forgot_password("forgetful@example.com").await.unwrap();
    assert_eq!(returned_id, user_id);

    let code = latest_code(&app, user_id, OtpType::ForgotPassword).await;
    let reset_token = match auth
        .verify_otp(user_id, &code, OtpType::ForgotPassword)
        .await
        .unwrap()
    {
        VerifiedOtp::ForgotPassword {
            user_id: verified_id,
            reset_token,
        } => {
            assert_eq!(verified_id, user_id);
            reset_token
        }
        other => panic!("unexpected verification result: {:?}", other),
    };

    auth.reset_password(&reset_token, "brandnewpassword")
        .await
        .unwrap();

    let old = auth
        .login(login_request("forgetful@example.com", "password123"))
        .await;
    assert!(matches!(old, Err(AuthServiceError::InvalidCredentials)));
    auth.login(login_request("forgetful@example.com", "brandnewpassword"))
        .await
        .unwrap();

    // Reset tokens are single-use
    let reuse = auth.reset_password(&reset_token, "anotherpassword").await;
    assert!(matches!(
        reuse,
        Err(AuthServiceError::Token(TokenError::Revoked))
    ));
}

#[tokio::test]
async fn test_forgot_password_unregistered_email() {
    let app = test_helpers::spawn_test_app().await.unwrap();

    let result = app
        .state
        .auth_service
        .forgot_password("ghost@example.com")
        .await;
    assert!(matches!(result, Err(AuthServiceError::EmailNotRegistered)));
}

#[tokio::test]
async fn test_renew_access_token() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let auth = &app.state.auth_service;
    let user_id = registered_user(&app, "renew@example.com", "password123").await;

    let session = auth
        .login(login_request("renew@example.com", "password123"))
        .await
        .unwrap();

    let access_token = auth
        .renew_access_token(&session.refresh_token)
        .await
        .unwrap();
    let claims = auth.authenticate_access_token(&access_token).await.unwrap();
    assert_eq!(claims.sub, user_id);

    let wrong_kind = auth.renew_access_token(&session.access_token).await;
    assert!(matches!(
        wrong_kind,
        Err(AuthServiceError::Token(TokenError::WrongTokenType))
    ));
}

#[tokio::test]
async fn test_access_token_expires() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let auth = &app.state.auth_service;
    registered_user(&app, "expiry@example.com", "password123").await;

    let session = auth
        .login(login_request("expiry@example.com", "password123"))
        .await
        .unwrap();

    app.clock.advance(Duration::hours(3));
    let result = auth.authenticate_access_token(&session.access_token).await;
    assert!(matches!(
        result,
        Err(AuthServiceError::Token(TokenError::TokenExpired))
    ));

    // The refresh token outlives the access token
    assert!(auth.renew_access_token(&session.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_logout_revokes_both_tokens() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let auth = &app.state.auth_service;
    registered_user(&app, "bye@example.com", "password123").await;

    let session = auth
        .login(login_request("bye@example.com", "password123"))
        .await
        .unwrap();
    let claims = auth
        .authenticate_access_token(&session.access_token)
        .await
        .unwrap();

    auth.logout(&claims, Some(&session.refresh_token))
        .await
        .unwrap();

    let access = auth.authenticate_access_token(&session.access_token).await;
    assert!(matches!(
        access,
        Err(AuthServiceError::Token(TokenError::Revoked))
    ));
    let refresh = auth.renew_access_token(&session.refresh_token).await;
    assert!(matches!(
        refresh,
        Err(AuthServiceError::Token(TokenError::Revoked))
    ));
}

#[tokio::test]
async fn test_logout_rejects_foreign_refresh_token() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let auth = &app.state.auth_service;
    registered_user(&app, "first@example.com", "password123").await;
    registered_user(&app, "second@example.com", "password123").await;

    let first = auth
        .login(login_request("first@example.com", "password123"))
        .await
        .unwrap();
    let second = auth
        .login(login_request("second@example.com", "password123"))
        .await
        .unwrap();
    let claims = auth
        .authenticate_access_token(&first.access_token)
        .await
        .unwrap();

    let result = auth.logout(&claims, Some(&second.refresh_token)).await;
    assert!(matches!(
        result,
        Err(AuthServiceError::Token(TokenError::InvalidToken))
    ));

    // Nothing was revoked
    assert!(auth
        .authenticate_access_token(&first.access_token)
        .await
        .is_ok());
}

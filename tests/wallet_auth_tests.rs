//! HTTP tests for wallet sign-in and cross-device linking

mod common;

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::Utc;
    use serde_json::json;

    use shacker_server::auth::{auth_message, link_message};

    use super::common::{send, test_app, TestWallet};

    async fn register(app: &axum::Router, username: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/register",
            None,
            Some(json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": "secret1"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn nonce_for(app: &axum::Router, address: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/wallet/nonce",
            None,
            Some(json!({ "address": address })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["nonce"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_wallet_sign_in_provisions_player() {
        let (app, _) = test_app().await;
        let wallet = TestWallet::new(7);
        let address = wallet.checksum_like_address();

        let nonce = nonce_for(&app, &address).await;
        let signature = wallet.sign(&auth_message(&address, &nonce));
        let request = json!({ "address": address, "signature": signature, "nonce": nonce });

        let (status, body) =
            send(&app, "POST", "/wallet/verify", None, Some(request.clone())).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["success"], true);
        assert_eq!(body["hasNFT"], false);
        assert_eq!(body["gamesLeft"], 10);
        let username = body["username"].as_str().unwrap().to_string();
        assert!(username.starts_with("Player_"), "{}", username);

        // nonces are single-use
        let (status, _) = send(&app, "POST", "/wallet/verify", None, Some(request)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // a second sign-in lands on the same account
        let nonce = nonce_for(&app, &wallet.address).await;
        let signature = wallet.sign(&auth_message(&wallet.address, &nonce));
        let (status, body) = send(
            &app,
            "POST",
            "/wallet/verify",
            None,
            Some(json!({ "address": wallet.address, "signature": signature, "nonce": nonce })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], username.as_str());

        let token = body["token"].as_str().unwrap().to_string();
        let (_, profile) = send(&app, "GET", "/profile", Some(&token), None).await;
        assert_eq!(profile["walletAddress"], wallet.address.as_str());
    }

    #[tokio::test]
    async fn test_wallet_sign_in_rejections() {
        let (app, _) = test_app().await;
        let wallet = TestWallet::new(7);
        let impostor = TestWallet::new(8);

        let (status, _) = send(
            &app,
            "POST",
            "/wallet/nonce",
            None,
            Some(json!({ "address": "0x1234" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let nonce = nonce_for(&app, &wallet.address).await;
        let forged = impostor.sign(&auth_message(&wallet.address, &nonce));
        let (status, _) = send(
            &app,
            "POST",
            "/wallet/verify",
            None,
            Some(json!({ "address": wallet.address, "signature": forged, "nonce": nonce })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // the failed attempt burned the nonce
        let genuine = wallet.sign(&auth_message(&wallet.address, &nonce));
        let (status, _) = send(
            &app,
            "POST",
            "/wallet/verify",
            None,
            Some(json!({ "address": wallet.address, "signature": genuine, "nonce": nonce })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cross_device_link_session() {
        let (app, _) = test_app().await;
        let alice = register(&app, "alice").await;
        let bob = register(&app, "bob").await;
        let wallet = TestWallet::new(9);

        let (status, body) = send(&app, "POST", "/wallet/create-session", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let session_id = body["sessionId"].as_str().unwrap().to_string();
        assert_eq!(
            body["linkUrl"],
            format!("http://localhost:8080/link.html?session={}", session_id).as_str()
        );

        let (status, body) = send(
            &app,
            "GET",
            &format!("/wallet/check-session?id={}", session_id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["username"], "alice");

        let (status, body) = send(
            &app,
            "GET",
            &format!("/wallet/session-status?sessionId={}", session_id),
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["completed"], false);

        let message = link_message("alice", Utc::now().timestamp_millis());
        let (status, body) = send(
            &app,
            "POST",
            "/wallet/link-session",
            None,
            Some(json!({
                "sessionId": session_id,
                "walletAddress": wallet.address,
                "signature": wallet.sign(&message),
                "message": message
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["success"], true);
        assert_eq!(body["wallet"], wallet.address.as_str());

        let (status, body) = send(
            &app,
            "GET",
            &format!("/wallet/session-status?sessionId={}", session_id),
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["completed"], true);
        assert_eq!(body["walletAddress"], wallet.address.as_str());

        let (status, _) = send(
            &app,
            "GET",
            &format!("/wallet/session-status?sessionId={}", session_id),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, "GET", "/wallet/check-session?id=missing", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // the wallet now belongs to alice, so bob cannot claim it
        let message = link_message("bob", Utc::now().timestamp_millis());
        let (status, _) = send(
            &app,
            "POST",
            "/wallet/link",
            Some(&bob),
            Some(json!({
                "wallet_address": wallet.address,
                "signature": wallet.sign(&message),
                "message": message
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_direct_wallet_link() {
        let (app, _) = test_app().await;
        let alice = register(&app, "alice").await;
        let wallet = TestWallet::new(11);

        // message naming someone else
        let wrong = link_message("mallory", Utc::now().timestamp_millis());
        let (status, _) = send(
            &app,
            "POST",
            "/wallet/link",
            Some(&alice),
            Some(json!({
                "wallet_address": wallet.address,
                "signature": wallet.sign(&wrong),
                "message": wrong
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let message = link_message("alice", Utc::now().timestamp_millis());
        let request = json!({
            "wallet_address": wallet.checksum_like_address(),
            "signature": wallet.sign(&message),
            "message": message
        });
        let (status, body) =
            send(&app, "POST", "/wallet/link", Some(&alice), Some(request.clone())).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["wallet"], wallet.address.as_str());

        // relinking the same wallet is a no-op
        let (status, _) = send(&app, "POST", "/wallet/link", Some(&alice), Some(request)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_check_nft_without_contract() {
        let (app, _) = test_app().await;
        let wallet = TestWallet::new(3);

        let (status, _) = send(
            &app,
            "POST",
            "/wallet/check-nft",
            None,
            Some(json!({ "wallet_address": "not-an-address" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/wallet/check-nft",
            None,
            Some(json!({ "wallet_address": wallet.address })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["owns_nft"], false);
    }
}

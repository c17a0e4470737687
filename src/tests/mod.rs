pub(crate) mod test_support;

use super::*;

#[ignore]
#[tokio::test]
async fn it_works() {
    let client = SessionClient::new(Config::new("http://localhost:8080/api"))
        .expect("Failed to create client");
    client.sign_in("access-token");
    let restored = client
        .restore_session()
        .await
        .expect("Failed to restore session");
    assert!(restored);
    let response = client
        .get("/user/profile/myInfo")
        .await
        .expect("Failed to fetch profile");
    assert!(response.status().is_success());
    client.sign_out().await;
    assert!(client.credential().is_none());
}

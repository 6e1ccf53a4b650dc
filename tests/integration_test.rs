// ABOUTME: End-to-end tests of the high-level client
// ABOUTME: Login, profile walk across pages, and downloading every media item

use insta_media_grabber_rs::{
    client::Client,
    config::{Config, DelayRange},
    error::AppError,
};
use mockito::{Matcher, Server};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn create_test_config() -> Config {
    Config::new("someone", "hunter2").with_request_delay(DelayRange::none())
}

fn shared_data_page(data: Value) -> String {
    format!(
        "<!DOCTYPE html><html><head></head><body>\
         <script type=\"text/javascript\">window._sharedData = {};</script>\
         </body></html>",
        data
    )
}

fn photo(server: &Server, id: &str) -> Value {
    json!({
        "__typename": "GraphImage",
        "id": id,
        "shortcode": format!("sc{}", id),
        "is_video": false,
        "display_url": format!("{}/cdn/{}.jpg?sig=1", server.url(), id)
    })
}

fn mock_login(server: &mut Server) -> (mockito::Mock, mockito::Mock) {
    let page = server
        .mock("GET", "/accounts/login/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(shared_data_page(json!({"config": {"csrf_token": "tok123"}})))
        .create();

    let post = server
        .mock("POST", "/accounts/login/ajax/")
        .match_header("x-csrftoken", "tok123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("set-cookie", "sessionid=sess42; Path=/")
        .with_body(r#"{"authenticated": true, "user": true, "userId": "99", "status": "ok"}"#)
        .create();

    (page, post)
}

#[test]
fn test_client_base_url() {
    let client = Client::new(Config::new("someone", "hunter2")).expect("Failed to create client");
    assert_eq!(client.base_url(), "https://www.instagram.com");
}

#[test]
fn test_profile_posts_before_login() {
    let server = Server::new();
    let client = Client::new_with_base_url(create_test_config(), server.url()).unwrap();

    assert!(matches!(
        client.profile_posts("target"),
        Err(AppError::NotYetAuthenticated)
    ));
}

#[test]
fn test_full_walk_and_download() {
    insta_media_grabber_rs::init();
    let mut server = Server::new();
    let (login_page, login_post) = mock_login(&mut server);

    let profile_body = shared_data_page(json!({
        "entry_data": {"ProfilePage": [{"graphql": {"user": {
            "id": "1001",
            "username": "target",
            "edge_owner_to_timeline_media": {
                "edges": [{"node": photo(&server, "1")}],
                "page_info": {"has_next_page": true, "end_cursor": "cursor-1"}
            }
        }}}]}
    }));
    let next_page_body = json!({"data": {"user": {"edge_owner_to_timeline_media": {
        "edges": [{"node": photo(&server, "2")}],
        "page_info": {"has_next_page": false, "end_cursor": null}
    }}}})
    .to_string();

    // the session cookie from the login response must ride along on later requests
    let profile_mock = server
        .mock("GET", "/target")
        .match_header("cookie", Matcher::Regex("sessionid=sess42".to_string()))
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(profile_body)
        .create();

    let query_mock = server
        .mock("GET", "/graphql/query/")
        .match_header("cookie", Matcher::Regex("sessionid=sess42".to_string()))
        .match_query(Matcher::UrlEncoded(
            "variables".to_string(),
            r#"{"id":"1001","first":12,"after":"cursor-1"}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(next_page_body)
        .expect(1)
        .create();

    let media_mock = server
        .mock("GET", Matcher::Regex(r"^/cdn/[12]\.jpg".to_string()))
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body("JPEG")
        .expect(2)
        .create();

    let mut client = Client::new_with_base_url(create_test_config(), server.url()).unwrap();
    client.login().expect("Login failed");
    assert!(client.is_authenticated().unwrap());

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output_dir = temp_dir.path().join("target");
    let paths = client
        .download_profile_posts("target", &output_dir)
        .expect("Download failed");

    login_page.assert();
    login_post.assert();
    profile_mock.assert();
    query_mock.assert();
    media_mock.assert();

    assert_eq!(paths, vec![output_dir.join("1.jpg"), output_dir.join("2.jpg")]);
    for path in &paths {
        assert_eq!(fs::read_to_string(path).unwrap(), "JPEG");
    }
}

#[test]
fn test_profile_posts_restart_from_first_page() {
    let mut server = Server::new();
    let (_login_page, _login_post) = mock_login(&mut server);

    let profile_body = shared_data_page(json!({
        "entry_data": {"ProfilePage": [{"graphql": {"user": {
            "id": "1001",
            "username": "target",
            "edge_owner_to_timeline_media": {
                "edges": [{"node": photo(&server, "1")}, {"node": photo(&server, "2")}],
                "page_info": {"has_next_page": false, "end_cursor": null}
            }
        }}}]}
    }));
    let profile_mock = server
        .mock("GET", "/target")
        .with_status(200)
        .with_body(profile_body)
        .expect(2)
        .create();

    let mut client = Client::new_with_base_url(create_test_config(), server.url()).unwrap();
    client.login().unwrap();

    let first_pass: Vec<_> = client
        .profile_posts("target")
        .unwrap()
        .take(1)
        .map(|r| r.unwrap().id().to_string())
        .collect();
    let second_pass: Vec<_> = client
        .profile_posts("target")
        .unwrap()
        .map(|r| r.unwrap().id().to_string())
        .collect();

    assert_eq!(first_pass, vec!["1"]);
    assert_eq!(second_pass, vec!["1", "2"]);
    profile_mock.assert();
}

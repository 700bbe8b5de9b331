use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves `html` at `url_path` on an existing mock server.
pub async fn mount_html(server: &MockServer, url_path: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Answers `url_path` with a bare status code.
pub async fn mount_status(server: &MockServer, url_path: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Creates a mock server serving a single HTML page.
pub async fn mock_site(url_path: &str, html: &str) -> MockServer {
    let server = MockServer::start().await;
    mount_html(&server, url_path, html).await;
    server
}

mod common;

use common::wiremock_helpers::{mock_site, mount_html, mount_status};
use common::{UNREACHABLE_URL, test_config};
use contact_harvester::{Harvester, ScrapeStatus, ScrapeTarget, SocialPlatform};
use wiremock::MockServer;

fn cloudflare_encode(email: &str, key: u8) -> String {
    let mut out = format!("{:02x}", key);
    for b in email.bytes() {
        out.push_str(&format!("{:02x}", b ^ key));
    }
    out
}

#[tokio::test]
async fn test_mailto_page_end_to_end() {
    let server = mock_site(
        "/",
        r#"<html><body><p>Reach out</p><a href="mailto:test@sample.org">Email us</a></body></html>"#,
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let harvester = Harvester::new(&test_config(dir.path())).unwrap();

    let result = harvester.scrape_url(&ScrapeTarget::new(server.uri())).await;

    assert_eq!(result.emails, vec!["test@sample.org"]);
    assert_eq!(result.status.to_string(), "success");
    assert_eq!(result.domain, "127.0.0.1");
    assert_eq!(result.url, server.uri());
}

#[tokio::test]
async fn test_contact_page_is_merged() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<html><body>
            <p>Welcome! Mail Sales@Shop.io</p>
            <a href="https://twitter.com/shop_old">Twitter</a>
            <a href="/contact">Contact us</a>
            <a href="/about">About</a>
        </body></html>"#,
    )
    .await;
    mount_html(
        &server,
        "/contact",
        r#"<html><body>
            <p>Phone: (555) 123-4567</p>
            <p>support [at] shop [dot] io</p>
            <a href="https://twitter.com/shop">Twitter</a>
        </body></html>"#,
    )
    .await;
    mount_html(&server, "/about", "<body>about-only@shop.io</body>").await;

    let dir = tempfile::tempdir().unwrap();
    let harvester = Harvester::new(&test_config(dir.path())).unwrap();
    let result = harvester.scrape_url(&ScrapeTarget::new(server.uri())).await;

    assert_eq!(result.status, ScrapeStatus::Success);
    assert_eq!(result.emails, vec!["sales@shop.io", "support@shop.io"]);
    assert!(result.phones.contains(&"(555) 123-4567".to_string()));
    assert_eq!(
        result.social_media.get(&SocialPlatform::Twitter).map(String::as_str),
        Some("https://twitter.com/shop")
    );
}

#[tokio::test]
async fn test_failing_contact_page_is_swallowed() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<body>hello@shop.io <a href="/contact-us">Contact</a></body>"#,
    )
    .await;
    mount_status(&server, "/contact-us", 500).await;

    let dir = tempfile::tempdir().unwrap();
    let harvester = Harvester::new(&test_config(dir.path())).unwrap();
    let result = harvester.scrape_url(&ScrapeTarget::new(server.uri())).await;

    assert_eq!(result.status, ScrapeStatus::Success);
    assert_eq!(result.emails, vec!["hello@shop.io"]);
}

#[tokio::test]
async fn test_obfuscated_emails_are_decoded() {
    let encoded = cloudflare_encode("owner@shop.io", 0x42);
    let html = format!(
        r#"<html><body>
            <a href="/cdn-cgi/l/email-protection#{}">[email&#160;protected]</a>
            <img src="x.png" alt="press@shop.io">
            <script>document.write('jobs' + '@' + 'shop' + '.' + 'io');</script>
            <p>Placeholder: you@example.com</p>
        </body></html>"#,
        encoded
    );
    let server = mock_site("/", &html).await;

    let dir = tempfile::tempdir().unwrap();
    let harvester = Harvester::new(&test_config(dir.path())).unwrap();
    let result = harvester.scrape_url(&ScrapeTarget::new(server.uri())).await;

    for expected in ["owner@shop.io", "press@shop.io", "jobs@shop.io"] {
        assert!(result.emails.contains(&expected.to_string()), "missing {}", expected);
    }
    assert!(!result.emails.iter().any(|e| e.contains("example.")));
}

#[tokio::test]
async fn test_unreachable_host_yields_error_result() {
    let dir = tempfile::tempdir().unwrap();
    let harvester = Harvester::new(&test_config(dir.path())).unwrap();
    let result = harvester.scrape_url(&ScrapeTarget::new(UNREACHABLE_URL)).await;

    assert!(result.status.to_string().starts_with("Error"));
    assert!(result.emails.is_empty());
    assert!(result.phones.is_empty());
    assert!(result.social_media.is_empty());
    assert_eq!(result.url, UNREACHABLE_URL);
}

#[tokio::test]
async fn test_non_success_status_yields_error_result() {
    let server = MockServer::start().await;
    mount_status(&server, "/", 404).await;

    let dir = tempfile::tempdir().unwrap();
    let harvester = Harvester::new(&test_config(dir.path())).unwrap();
    let result = harvester.scrape_url(&ScrapeTarget::new(server.uri())).await;

    assert!(!result.status.is_success());
    assert!(result.status.to_string().contains("HTTP status 404"));
}

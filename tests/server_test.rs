use actix_web::{App, test};
use showtell::livereload::MIN_HEARTBEAT;
use showtell::server::routes;
use showtell::{
    AssetGroup, LivereloadEvent, MemoryAssetStore, Presentation, PresentationServer, RevealAssets,
    ServerOptions, ShowError,
};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn write_slide(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).expect("Failed to write slide");
}

fn test_options() -> ServerOptions {
    let assets = RevealAssets::new(vec![AssetGroup::new(
        "css",
        MemoryAssetStore::new().with_file("theme/white.css", "body { color: black; }"),
    )]);
    ServerOptions {
        assets,
        ..ServerOptions::default()
    }
}

fn create_server(slide_dir: &Path) -> PresentationServer {
    PresentationServer::create(
        CancellationToken::new(),
        Presentation::new("Demo"),
        slide_dir,
        "127.0.0.1:0",
        test_options(),
    )
    .expect("Failed to create server")
}

#[actix_web::test]
async fn test_serves_rendered_document() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_slide(temp_dir.path(), "intro.md", "# Hello");
    let server = create_server(temp_dir.path());

    let app = test::init_service(App::new().app_data(server.state()).configure(routes)).await;
    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"));

    let body = test::read_body(resp).await;
    assert_eq!(body, server.serve_document());
    let text = String::from_utf8(body.to_vec()).expect("Document is not UTF-8");
    assert!(text.contains("<h1>Hello</h1>"));
    assert!(text.contains("<title>Demo</title>"));
}

#[actix_web::test]
async fn test_serves_assets_and_404s() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_slide(temp_dir.path(), "intro.md", "# Hello");
    let server = create_server(temp_dir.path());
    let app = test::init_service(App::new().app_data(server.state()).configure(routes)).await;

    let req = test::TestRequest::get().uri("/css/theme/white.css").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("text/css")
    );
    assert_eq!(test::read_body(resp).await, "body { color: black; }");

    let req = test::TestRequest::get().uri("/css/missing.css").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);

    let req = test::TestRequest::get().uri("/js/reveal.js").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn test_first_render_failure_prevents_start() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_slide(temp_dir.path(), "notes.txt", "not a slide");

    let result = PresentationServer::create(
        CancellationToken::new(),
        Presentation::default(),
        temp_dir.path(),
        ":0",
        ServerOptions::default(),
    );
    assert!(matches!(result, Err(ShowError::NoParserForFormat(_))));
}

#[actix_web::test]
async fn test_rerender_picks_up_changes() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_slide(temp_dir.path(), "intro.md", "# Before");
    let server = create_server(temp_dir.path());

    write_slide(temp_dir.path(), "intro.md", "# After");
    write_slide(temp_dir.path(), "outro.md", "# Bye");
    server.rerender().expect("Failed to rerender");

    let document =
        String::from_utf8(server.serve_document().to_vec()).expect("Document is not UTF-8");
    assert!(document.contains("<h1>After</h1>"));
    assert!(document.contains("<h1>Bye</h1>"));
    assert!(!document.contains("<h1>Before</h1>"));
    assert_eq!(server.state().presentation().slides.len(), 2);
}

#[actix_web::test]
async fn test_failed_rerender_keeps_previous_document() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_slide(temp_dir.path(), "intro.md", "# Good");
    let server = create_server(temp_dir.path());
    let before = server.serve_document();

    write_slide(temp_dir.path(), "intro.md", "+++\nnotes: [oops\n+++\n# Broken");
    let result = server.rerender();

    assert!(matches!(result, Err(ShowError::MetadataParseError { .. })));
    assert_eq!(server.serve_document(), before);
    assert_eq!(server.state().presentation().slides[0].content.trim(), "<h1>Good</h1>");
}

#[actix_web::test]
async fn test_rerender_notifies_livereload_once() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_slide(temp_dir.path(), "intro.md", "# Hello");
    let server = create_server(temp_dir.path());
    let state = server.state();

    let (_first_id, mut first) = state.livereload().register();
    let (_second_id, mut second) = state.livereload().register();

    server.rerender().expect("Failed to rerender");
    assert_eq!(first.try_recv(), Ok(LivereloadEvent::Reload));
    assert_eq!(second.try_recv(), Ok(LivereloadEvent::Reload));
    assert!(first.try_recv().is_err());

    // A failed render still tells viewers to reload
    write_slide(temp_dir.path(), "broken.txt", "no parser");
    assert!(server.rerender().is_err());
    assert_eq!(first.try_recv(), Ok(LivereloadEvent::Reload));
    assert!(first.try_recv().is_err());
    assert_eq!(second.try_recv(), Ok(LivereloadEvent::Reload));
}

#[actix_web::test]
async fn test_readers_never_see_partial_documents() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_slide(temp_dir.path(), "slide.md", "# Version A");
    let server = create_server(temp_dir.path());

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..200 {
                    let document = server.serve_document();
                    let text = std::str::from_utf8(&document).expect("Document is not UTF-8");
                    assert!(text.starts_with("<!DOCTYPE html>"));
                    assert!(text.ends_with("</html>\n"));
                    let a = text.contains("<h1>Version A</h1>");
                    let b = text.contains("<h1>Version B</h1>");
                    assert!(a ^ b, "Document mixes two renders");
                }
            });
        }

        for round in 0..20 {
            let version = if round % 2 == 0 { "B" } else { "A" };
            write_slide(temp_dir.path(), "slide.md", &format!("# Version {}", version));
            server.rerender().expect("Failed to rerender");
        }
    });
}

#[actix_web::test]
async fn test_close_without_run_is_harmless() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_slide(temp_dir.path(), "intro.md", "# Hello");
    let server = create_server(temp_dir.path());

    server.close().await;
    assert!(!server.serve_document().is_empty());
}

#[actix_web::test]
async fn test_concurrent_rerenders_keep_document_and_presentation_together() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_slide(temp_dir.path(), "slide.md", "# Version 0");
    let server = create_server(temp_dir.path());
    let state = server.state();

    thread::scope(|scope| {
        for _ in 0..2 {
            scope.spawn(|| {
                for _ in 0..20 {
                    // Either render may win, the pair must still match
                    let _ = server.rerender();
                }
            });
        }
        scope.spawn(|| {
            for round in 1..20 {
                write_slide(temp_dir.path(), "slide.md", &format!("# Version {}", round));
            }
        });
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..200 {
                    let (document, presentation) = state.snapshot();
                    let text = std::str::from_utf8(&document).expect("Document is not UTF-8");
                    let content = &presentation.slides[0].content;
                    assert!(text.contains(content.as_str()), "Presentation is from another render");
                }
            });
        }
    });
}

#[actix_web::test]
async fn test_zero_heartbeat_is_clamped() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_slide(temp_dir.path(), "intro.md", "# Hello");
    let options = ServerOptions {
        heartbeat_interval: Duration::ZERO,
        ..ServerOptions::default()
    };
    let server = PresentationServer::create(
        CancellationToken::new(),
        Presentation::default(),
        temp_dir.path(),
        "127.0.0.1:0",
        options,
    )
    .expect("Failed to create server");

    assert_eq!(server.state().heartbeat_interval(), MIN_HEARTBEAT);
}

use http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use http::{Method, Response, StatusCode};
use http_body_util::BodyExt;
use sprig::cookie::{CookieOptions, CookiePrefix, SameSite};
use sprig::{endpoint_fn, handler_fn, Html, RequestInit, ResponseBody, Router};
use std::time::Duration;

async fn body_text(response: Response<ResponseBody>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn set_cookies(response: &Response<ResponseBody>) -> Vec<String> {
    response.headers().get_all(SET_COOKIE).iter().map(|value| value.to_str().unwrap().to_string()).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn response_helpers() {
    let router = Router::builder()
        .get("/text", endpoint_fn(|ctx| Box::pin(async move { ctx.text("plain") })))
        .get("/json", endpoint_fn(|ctx| Box::pin(async move { ctx.json(&serde_json::json!({ "ok": true })) })))
        .get("/html", endpoint_fn(|ctx| Box::pin(async move { ctx.html("<p>hi</p>") })))
        .get("/redirect", endpoint_fn(|ctx| Box::pin(async move { ctx.redirect("/text") })))
        .get("/moved", endpoint_fn(|ctx| Box::pin(async move { ctx.redirect_with("/text", StatusCode::MOVED_PERMANENTLY) })))
        .get("/markup", endpoint_fn(|ctx| Box::pin(async move { ctx.respond(Html("<b>x</b>")) })))
        .build()
        .unwrap();

    let text = router.request("/text").await;
    assert_eq!(text.headers()[CONTENT_TYPE], "text/plain; charset=UTF-8");
    assert_eq!(body_text(text).await, "plain");

    let json = router.request("/json").await;
    assert_eq!(json.headers()[CONTENT_TYPE], "application/json; charset=UTF-8");
    assert_eq!(body_text(json).await, r#"{"ok":true}"#);

    let html = router.request("/html").await;
    assert_eq!(html.headers()[CONTENT_TYPE], "text/html; charset=UTF-8");
    assert_eq!(body_text(html).await, "<p>hi</p>");

    let redirect = router.request("/redirect").await;
    assert_eq!(redirect.status(), StatusCode::FOUND);
    assert_eq!(redirect.headers()[LOCATION], "/text");

    assert_eq!(router.request("/moved").await.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(body_text(router.request("/markup").await).await, "<b>x</b>");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn headers_and_status_accumulate() {
    let router = Router::builder()
        .middleware(handler_fn(|ctx, next| {
            Box::pin(async move {
                ctx.append_header("x-foo", "Bar")?;
                ctx.header("x-gone", "soon")?;
                next.run(ctx).await
            })
        }))
        .get(
            "/",
            endpoint_fn(|ctx| {
                Box::pin(async move {
                    ctx.append_header("x-foo", "Buzz")?;
                    ctx.remove_header("x-gone");
                    ctx.status(StatusCode::CREATED);
                    ctx.text("created")
                })
            }),
        )
        .build()
        .unwrap();

    let response = router.request("/").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let foo: Vec<_> = response.headers().get_all("x-foo").iter().map(|v| v.to_str().unwrap()).collect();
    assert_eq!(foo.join(", "), "Bar, Buzz");
    assert!(!response.headers().contains_key("x-gone"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn explicit_status_wins_over_pending_status() {
    let router = Router::builder()
        .get(
            "/",
            endpoint_fn(|ctx| {
                Box::pin(async move {
                    ctx.status(StatusCode::CREATED);
                    ctx.respond((StatusCode::ACCEPTED, "queued"))
                })
            }),
        )
        .build()
        .unwrap();

    assert_eq!(router.request("/").await.status(), StatusCode::ACCEPTED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn request_accessors() {
    let router = Router::builder()
        .route(
            "/items/:id",
            sprig::router::all(endpoint_fn(|ctx| {
                Box::pin(async move {
                    let id = ctx.param("id").unwrap_or_default().to_string();
                    let tags = ctx.req().queries("tag").join("+");
                    let first = ctx.req().query("tag").unwrap_or_default();
                    let agent = ctx.req().header("x-agent").unwrap_or_default().to_string();
                    let body = ctx.req_mut().text().await?;
                    let again = ctx.req_mut().bytes().await?;
                    let line = format!("{} {id} {tags} {first} {agent} {body} {}", ctx.method(), again.len());
                    ctx.text(line)
                })
            })),
        )
        .build()
        .unwrap();

    let init = RequestInit::new().method(Method::PUT).header("x-agent", "test").body("payload");
    let response = router.request_with("/items/9?tag=a&tag=b", init).await;
    assert_eq!(body_text(response).await, "PUT 9 a+b a test payload 7");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cookies_are_read_and_written() {
    let router = Router::builder()
        .get(
            "/",
            endpoint_fn(|ctx| {
                Box::pin(async move {
                    let visits = ctx.cookies().get("visits").and_then(|cookie| cookie.number()).unwrap_or_default();
                    let options = CookieOptions::new().path("/").http_only(true).same_site(SameSite::Lax);
                    ctx.cookies_mut().set("visits", (visits + 1.0).to_string(), options);
                    ctx.cookies_mut().delete("stale", &CookieOptions::new().path("/"));
                    ctx.text(format!("visits {visits}"))
                })
            }),
        )
        .build()
        .unwrap();

    let response = router.request_with("/", RequestInit::new().header(COOKIE, "visits=2; stale=x")).await;
    assert_eq!(
        set_cookies(&response),
        vec![
            "visits=3; Path=/; HttpOnly; SameSite=Lax".to_string(),
            "stale=deleted; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT".to_string(),
        ]
    );
    assert_eq!(body_text(response).await, "visits 2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cookie_round_trip() {
    let original = "a b;c=d,ü";
    let router = Router::builder()
        .get(
            "/set",
            endpoint_fn(move |ctx| {
                Box::pin(async move {
                    ctx.cookies_mut().set("token", original, CookieOptions::new().max_age(Duration::from_secs(60)));
                    ctx.text("set")
                })
            }),
        )
        .get(
            "/read",
            endpoint_fn(|ctx| {
                Box::pin(async move {
                    let token = ctx.cookies().get("token").map(|cookie| cookie.as_str().to_string()).unwrap_or_default();
                    ctx.text(token)
                })
            }),
        )
        .build()
        .unwrap();

    let set = router.request("/set").await;
    let header = set_cookies(&set).remove(0);
    let pair = header.split(';').next().unwrap().to_string();

    let read = router.request_with("/read", RequestInit::new().header(COOKIE, pair)).await;
    assert_eq!(body_text(read).await, original);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn prefixed_cookie_gets_its_attributes() {
    let router = Router::builder()
        .get(
            "/",
            endpoint_fn(|ctx| {
                Box::pin(async move {
                    let options = CookieOptions::new().prefix(CookiePrefix::Host).domain("example.com");
                    ctx.cookies_mut().set("id", "1", options);
                    ctx.text("ok")
                })
            }),
        )
        .build()
        .unwrap();

    let response = router.request("/").await;
    assert_eq!(set_cookies(&response), vec!["__Host-id=1; Path=/; Secure".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn invalid_cookie_options_fail_the_response() {
    let router = Router::builder()
        .get(
            "/",
            endpoint_fn(|ctx| {
                Box::pin(async move {
                    ctx.cookies_mut().set("__Host-id", "1", CookieOptions::new().path("/"));
                    ctx.text("unreachable")
                })
            }),
        )
        .build()
        .unwrap();

    assert_eq!(router.request("/").await.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

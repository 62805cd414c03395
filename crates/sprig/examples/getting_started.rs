use futures::future::BoxFuture;
use http::Method;
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use sprig::router::{get, post};
use sprig::validate::{schema, Channel, SchemaMap};
use sprig::{endpoint_fn, handler_fn, RequestContext, RequestInit, ResponseResult, Router, RouterBuilder};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Deserialize, Serialize, Debug)]
pub struct User {
    name: String,
    zip: String,
}

fn hello(ctx: &mut RequestContext) -> BoxFuture<'_, ResponseResult> {
    Box::pin(async move {
        let greeting = ctx.field::<String>("greeting")?.clone();
        ctx.text(format!("{greeting} from {}\r\n", ctx.method()))
    })
}

fn create_user(ctx: &mut RequestContext) -> BoxFuture<'_, ResponseResult> {
    Box::pin(async move {
        let user: User = ctx.valid_as(Channel::Json)?;
        info!(?user, "user created");
        ctx.status(http::StatusCode::CREATED);
        ctx.json(&user)
    })
}

fn users(router: RouterBuilder) -> RouterBuilder {
    router
        .route("/", post(endpoint_fn(create_user)).schema(SchemaMap::new().json(schema::<User>())))
        .route(
            "/:name",
            get(endpoint_fn(|ctx| {
                Box::pin(async move {
                    let name = ctx.param("name").unwrap_or_default().to_string();
                    ctx.text(format!("user {name}\r\n"))
                })
            })),
        )
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let router = match Router::builder()
        .middleware(handler_fn(|ctx, next| {
            Box::pin(async move {
                let started = std::time::Instant::now();
                let response = next.run(ctx).await;
                info!(path = ctx.path(), elapsed = ?started.elapsed(), "request handled");
                response
            })
        }))
        .decorate("greeting", String::from("hello"))
        .route("/", get(endpoint_fn(hello)))
        .register("/users", users)
        .build()
    {
        Ok(router) => router,
        Err(e) => {
            error!(cause = %e, "invalid routes");
            return;
        }
    };

    for route in router.routes() {
        info!(method = %route.method, path = %route.path, channels = ?route.channels, "route registered");
    }

    let requests = vec![
        ("/", RequestInit::new()),
        ("/users/zava", RequestInit::new()),
        ("/users", RequestInit::new().method(Method::POST).json(&User { name: "hello".into(), zip: "world".into() })),
        ("/users", RequestInit::new().method(Method::POST).json(&serde_json::json!({ "name": "no zip" }))),
        ("/missing", RequestInit::new()),
    ];

    for (path, init) in requests {
        let response = router.request_with(path, init).await;
        let status = response.status();
        let body = match response.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                error!(cause = %e, "failed to read response body");
                continue;
            }
        };
        info!(path, %status, body = %String::from_utf8_lossy(&body), "response");
    }
}

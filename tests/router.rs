use hyper::body::to_bytes;
use hyper::header;
use hyper::service::Service;
use hyper::{Body, Method, Request, Response, StatusCode};
use routemark::{Params, Route, RouteCache, RouteConfig, RouteError, Router};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn index(_: Request<Body>) -> hyper::Result<Response<Body>> {
    Ok(Response::new(Body::from("index")))
}

async fn show(req: Request<Body>) -> hyper::Result<Response<Body>> {
    let params = req.extensions().get::<Params>().unwrap();
    Ok(Response::new(Body::from(format!(
        "show {}",
        params.get("id").unwrap()
    ))))
}

async fn comment(req: Request<Body>) -> hyper::Result<Response<Body>> {
    let params = req.extensions().get::<Params>().unwrap();
    let pairs: Vec<String> = params
        .iter()
        .map(|p| format!("{}={}", p.key, p.value))
        .collect();
    Ok(Response::new(Body::from(pairs.join("&"))))
}

async fn custom_not_found(_: Request<Body>) -> hyper::Result<Response<Body>> {
    let mut res = Response::new(Body::from("custom 404"));
    *res.status_mut() = StatusCode::NOT_FOUND;
    Ok(res)
}

fn posts_router() -> Router {
    Router::builder()
        .get("/posts", index)
        .get("/posts/{id}", show)
        .get("/posts/{post}/comments/{comment}", comment)
        .build()
        .unwrap()
}

fn request(method: Method, path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

async fn body(res: Response<Body>) -> String {
    let bytes = to_bytes(res.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn static_and_dynamic_routes() {
    init_tracing();
    let router = posts_router();

    for path in ["/posts", "/posts/"].iter() {
        let res = router.serve(request(Method::GET, path)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(res).await, "index");
    }

    for path in ["/posts/42", "/posts/42/"].iter() {
        let res = router.serve(request(Method::GET, path)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(res).await, "show 42");
    }

    let res = router
        .serve(request(Method::GET, "/posts/7/comments/99"))
        .await
        .unwrap();
    assert_eq!(body(res).await, "post=7&comment=99");
}

#[tokio::test]
async fn method_not_allowed() {
    init_tracing();
    let router = posts_router();

    let res = router.serve(request(Method::POST, "/posts/42")).await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()[header::ALLOW], "GET, OPTIONS");
}

#[tokio::test]
async fn method_not_allowed_can_be_disabled() {
    let router = Router::builder()
        .handle_method_not_allowed(false)
        .get("/posts", index)
        .build()
        .unwrap();

    let res = router.serve(request(Method::DELETE, "/posts")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn not_found() {
    let router = posts_router();

    let res = router.serve(request(Method::GET, "/unknown")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let router = Router::builder()
        .get("/posts", index)
        .not_found(custom_not_found)
        .build()
        .unwrap();
    let res = router.serve(request(Method::GET, "/unknown")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(res).await, "custom 404");
}

#[tokio::test]
async fn automatic_options() {
    let router = Router::builder()
        .get("/home", index)
        .post("/home", index)
        .build()
        .unwrap();

    let res = router.serve(request(Method::OPTIONS, "/home")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::ALLOW], "GET, POST, OPTIONS");

    let res = router.serve(request(Method::OPTIONS, "*")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = router.serve(request(Method::OPTIONS, "/missing")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn explicit_options_route_wins() {
    let router = Router::builder()
        .get("/home", index)
        .options("/home", comment)
        .build()
        .unwrap();

    let res = router.serve(request(Method::OPTIONS, "/home")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(header::ALLOW).is_none());
}

#[tokio::test]
async fn fixed_path_redirect() {
    let router = posts_router();

    let res = router.serve(request(Method::GET, "/x/../posts//42")).await.unwrap();
    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.headers()[header::LOCATION], "/posts/42");

    let router = Router::builder()
        .put("/posts/{id}", show)
        .build()
        .unwrap();
    let res = router.serve(request(Method::PUT, "//posts/1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(res.headers()[header::LOCATION], "/posts/1");

    let router = Router::builder()
        .redirect_fixed_path(false)
        .get("/posts", index)
        .build()
        .unwrap();
    let res = router.serve(request(Method::GET, "//posts")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn served_as_service() {
    let router = posts_router();
    let mut make_service = router.into_service();

    let mut service = make_service.call(()).await.unwrap();
    let res = service.call(request(Method::GET, "/posts/5")).await.unwrap();
    assert_eq!(body(res).await, "show 5");
}

#[tokio::test]
async fn thirty_dynamic_routes() {
    let mut builder = Router::builder();
    for i in 0..30 {
        builder = builder.get(&format!("/r{}/{{id}}", i), comment);
    }
    let router = builder.build().unwrap();

    for i in 0..30 {
        let res = router
            .serve(request(Method::GET, &format!("/r{}/{}", i, i)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(res).await, format!("id={}", i));
    }

    let marks: Vec<_> = router
        .table()
        .config()
        .tree()
        .routes_for_method(&Method::GET)
        .iter()
        .map(|m| m.mark.to_string())
        .collect();
    let mut unique = marks.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 30);
    assert!(marks.contains(&"aa".to_owned()));
}

#[tokio::test]
async fn cached_routes_serve_identically() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cache = RouteCache::new(dir.path().join("routes.json"));

    let declare = || -> Result<RouteConfig, RouteError> {
        let mut config = RouteConfig::new();
        config.add_route(Route::new(Method::GET, "/posts", "posts.index")?)?;
        config.add_route(Route::new(Method::GET, "/posts/{id}", "posts.show")?)?;
        config.add_route(Route::new(
            Method::GET,
            "/posts/{post}/comments/{comment}",
            "comments.show",
        )?)?;
        Ok(config)
    };

    let build = |config: RouteConfig| {
        Router::builder()
            .with_config(config)
            .bind("posts.index", index)
            .bind("posts.show", show)
            .bind("comments.show", comment)
            .build()
            .unwrap()
    };

    let fresh = build(cache.load_or_compile(declare).unwrap());
    let cached = build(
        cache
            .load_or_compile(|| panic!("routes were recompiled"))
            .unwrap(),
    );

    let probes = [
        (Method::GET, "/posts"),
        (Method::GET, "/posts/"),
        (Method::GET, "/posts/3"),
        (Method::GET, "/posts/3/comments/4/"),
        (Method::POST, "/posts/3"),
        (Method::GET, "/nope"),
    ];

    for (method, path) in probes.iter() {
        let a = fresh.serve(request(method.clone(), path)).await.unwrap();
        let b = cached.serve(request(method.clone(), path)).await.unwrap();
        assert_eq!(a.status(), b.status(), "{} {}", method, path);
        assert_eq!(body(a).await, body(b).await, "{} {}", method, path);
    }
}

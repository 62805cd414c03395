/// One request path to benchmark, with the size class of the route table it runs against.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    path: &'static str,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, path: &'static str) -> Self {
        Self { name, group, path }
    }

    pub fn small(name: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Small, path)
    }

    pub fn large(name: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Large, path)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn path(&self) -> &'static str {
        self.path
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    /// A handful of routes.
    Small,
    /// Every route of [`ROUTES`].
    Large,
}

impl TestGroup {
    pub fn routes(self) -> &'static [&'static str] {
        match self {
            TestGroup::Small => &ROUTES[..4],
            TestGroup::Large => ROUTES,
        }
    }
}

/// A route table shaped like a typical REST api.
pub static ROUTES: &[&str] = &[
    "/",
    "/health",
    "/users/:id",
    "/users/me",
    "/users/:id/posts",
    "/users/:id/posts/:post",
    "/users/:id/posts/:post/comments",
    "/posts/:slug{[a-z0-9-]+}",
    "/files/:path{.+\\.png}",
    "/static/*",
    "/api/v1/orders",
    "/api/v1/orders/:order",
    "/api/v1/orders/:order/items",
    "/api/v1/orders/:order/items/:item",
    "/api/v1/customers",
    "/api/v1/customers/:customer",
    "/api/v2/orders",
    "/api/v2/orders/:order",
    "/*",
];

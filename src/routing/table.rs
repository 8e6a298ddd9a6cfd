//! The storefront API route table.

use axum::routing::MethodFilter;

/// Public prefix of every API route.
pub const API_PREFIX: &str = "/api/v1";

/// HTTP methods used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RouteMethod {
    pub fn filter(self) -> MethodFilter {
        match self {
            Self::Get => MethodFilter::GET,
            Self::Post => MethodFilter::POST,
            Self::Put => MethodFilter::PUT,
            Self::Delete => MethodFilter::DELETE,
        }
    }

    pub fn is_mutating(self) -> bool {
        !matches!(self, Self::Get)
    }
}

/// One API route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSpec {
    /// Identifier for logs and metrics.
    pub name: &'static str,
    pub method: RouteMethod,
    /// Path below [`API_PREFIX`], with `{param}` placeholders.
    pub path: &'static str,
    /// Requires a verified bearer credential.
    pub auth: bool,
    /// Requires a matching double-submit token.
    pub csrf: bool,
}

const fn route(
    name: &'static str,
    method: RouteMethod,
    path: &'static str,
    auth: bool,
    csrf: bool,
) -> RouteSpec {
    RouteSpec {
        name,
        method,
        path,
        auth,
        csrf,
    }
}

/// Every route the gateway forwards to the controller service.
pub static API_ROUTES: &[RouteSpec] = &[
    // Accounts
    route("register", RouteMethod::Post, "/register", false, true),
    route("login", RouteMethod::Post, "/login", false, true),
    route("user_details", RouteMethod::Get, "/getUserDetails", true, false),
    route("logout", RouteMethod::Get, "/logout", true, false),
    // API keys
    route("list_api_keys", RouteMethod::Get, "/getApiKeys", true, false),
    route("generate_api_key", RouteMethod::Post, "/generateNewApiKey", true, true),
    route("delete_api_key", RouteMethod::Delete, "/deleteApiKey/{apiKey}", true, true),
    // Products
    route("create_product", RouteMethod::Post, "/createProduct", true, true),
    route("admin_products", RouteMethod::Get, "/admin-products-list", true, false),
    route("delete_product", RouteMethod::Delete, "/delete-product/{id}", true, true),
    route("update_product", RouteMethod::Put, "/update-product/{id}", true, true),
];

/// A piece of a path template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSegment<'a> {
    Literal(&'a str),
    Param(&'a str),
}

impl RouteSpec {
    /// Non-empty segments of the path template.
    pub fn segments(&self) -> impl Iterator<Item = PathSegment<'static>> {
        self.path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                match segment
                    .strip_prefix('{')
                    .and_then(|rest| rest.strip_suffix('}'))
                {
                    Some(name) => PathSegment::Param(name),
                    None => PathSegment::Literal(segment),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_mutating_route_is_csrf_protected() {
        for spec in API_ROUTES {
            assert_eq!(
                spec.method.is_mutating(),
                spec.csrf,
                "route {} has inconsistent CSRF protection",
                spec.name
            );
        }
    }

    #[test]
    fn test_only_account_entry_points_are_public() {
        let public: Vec<_> = API_ROUTES
            .iter()
            .filter(|spec| !spec.auth)
            .map(|spec| spec.name)
            .collect();
        assert_eq!(public, vec!["register", "login"]);
    }

    #[test]
    fn test_segments() {
        let spec = API_ROUTES
            .iter()
            .find(|spec| spec.name == "delete_api_key")
            .unwrap();
        let segments: Vec<_> = spec.segments().collect();
        assert_eq!(
            segments,
            vec![
                PathSegment::Literal("deleteApiKey"),
                PathSegment::Param("apiKey")
            ]
        );
    }

    #[test]
    fn test_paths_are_unique() {
        let mut paths: Vec<_> = API_ROUTES.iter().map(|spec| spec.path).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), API_ROUTES.len());
    }
}

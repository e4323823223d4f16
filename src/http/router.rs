//! Method + path-template routing.
//!
//! Patterns are split on `/` once, at registration. Each segment is either
//! a literal, compared byte for byte, or a `{name}` placeholder that matches
//! any single segment and binds it to `name`:
//!
//! ```text
//! pattern  /files/{filename}   ->  ["", "files", {filename}]
//! target   /files/notes.txt    ->  ["", "files", "notes.txt"]   match, filename = "notes.txt"
//! target   /files/a/b          ->  ["", "files", "a", "b"]      no match (4 != 3 segments)
//! ```
//!
//! # Priority
//!
//! When several routes match the same request, the one with the most
//! literal segments wins. On a tie, a route registered for the exact
//! method beats a `*` route, and after that the earliest registration wins.

use crate::{
    http::{request::Request, response::ResponseWriter},
    server::server_impl::{DynHandler, Handler},
};
use std::{fmt, io, sync::Arc};

/// Method that matches every request method.
pub const ANY_METHOD: &str = "*";

/// One `/`-separated piece of a [`Pattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    Param(String),
}

impl Segment {
    #[inline]
    fn parse(raw: &str) -> Self {
        match raw
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        {
            Some(name) => Segment::Param(name.to_owned()),
            None => Segment::Literal(raw.to_owned()),
        }
    }

    #[inline]
    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(literal) => literal == segment,
            Segment::Param(_) => true,
        }
    }
}

/// A compiled path template such as `/echo/{value}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_owned(),
            segments: raw.split('/').map(Segment::parse).collect(),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// `true` if `path` has the same number of segments and every literal
    /// segment is equal.
    pub fn matches(&self, path: &str) -> bool {
        let mut parts = path.split('/');

        for segment in &self.segments {
            match parts.next() {
                Some(part) if segment.matches(part) => {}
                _ => return false,
            }
        }

        parts.next().is_none()
    }

    /// The segment of `path` sitting where `{name}` is in the pattern.
    pub fn value<'p>(&self, path: &'p str, name: &str) -> Option<&'p str> {
        self.segments
            .iter()
            .zip(path.split('/'))
            .find_map(|(segment, part)| match segment {
                Segment::Param(param) if param == name => Some(part),
                _ => None,
            })
    }

    #[inline]
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Literal(_)))
            .count()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A registered `(method, pattern) -> handler` entry.
pub struct Route {
    method: String,
    pattern: Arc<Pattern>,
    handler: Arc<dyn DynHandler>,
}

impl Route {
    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    pub fn pattern(&self) -> &Arc<Pattern> {
        &self.pattern
    }

    /// Registration key, `"METHOD pattern"`.
    #[inline]
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.pattern)
    }

    #[inline]
    fn accepts(&self, method: &str) -> bool {
        self.method == ANY_METHOD || self.method == method
    }

    #[inline]
    pub(crate) async fn call(
        &self,
        request: &Request,
        response: &mut ResponseWriter,
    ) -> io::Result<()> {
        self.handler.call(request, response).await
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Immutable route table shared by every connection.
///
/// # Examples
///
/// ```
/// use mini_web::{Handler, Request, ResponseWriter, Router, StatusCode};
/// use std::io;
///
/// struct Hello;
///
/// impl Handler for Hello {
///     async fn handle(&self, req: &Request, resp: &mut ResponseWriter) -> io::Result<()> {
///         let name = req.path_value("name").to_owned();
///         resp.status(StatusCode::OK).body(format!("hello {name}"));
///         Ok(())
///     }
/// }
///
/// let router = Router::builder().route("GET", "/hello/{name}", Hello).build();
///
/// let route = router.match_route("GET", "/hello/world").unwrap();
/// assert_eq!(route.pattern().as_str(), "/hello/{name}");
/// assert!(router.match_route("POST", "/hello/world").is_none());
/// ```
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    #[inline]
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// Finds the route for `method` and `target`.
    ///
    /// The route with the most literal segments wins. Ties go to an exact
    /// method over `*`, then to the earliest registration.
    pub fn match_route(&self, method: &str, target: &str) -> Option<&Route> {
        let mut best: Option<(&Route, (usize, bool))> = None;

        for route in &self.routes {
            if !route.accepts(method) || !route.pattern.matches(target) {
                continue;
            }

            let rank = (route.pattern.literal_count(), route.method != ANY_METHOD);
            match best {
                Some((_, best_rank)) if best_rank >= rank => {}
                _ => best = Some((route, rank)),
            }
        }

        best.map(|(route, _)| route)
    }

    #[inline]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Collects routes before the server starts.
#[derive(Default)]
pub struct RouterBuilder {
    routes: Vec<Route>,
}

impl RouterBuilder {
    /// Registers `handler` for `method` (or `"*"`) and `pattern`.
    ///
    /// Registering the same method and pattern again replaces the earlier
    /// handler and keeps its position.
    pub fn route<H: Handler>(mut self, method: &str, pattern: &str, handler: H) -> Self {
        let route = Route {
            method: method.to_owned(),
            pattern: Arc::new(Pattern::parse(pattern)),
            handler: Arc::new(handler),
        };

        match self
            .routes
            .iter_mut()
            .find(|r| r.method == route.method && r.pattern.as_str() == route.pattern.as_str())
        {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }

        self
    }

    #[inline]
    pub fn build(self) -> Router {
        Router {
            routes: self.routes,
        }
    }
}

//! Path router. Rules are written as `/api/orders/<int:order_id>`; `<name>` matches one
//! path segment and `<int:name>` one run of digits. Captures reach the route builder in order.

use hyper::Method;
use regex::Regex;

/// Registered rule as listed by the route table endpoint
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteRule {
    pub rule: String,
    pub methods: Vec<String>,
}

struct Entry<R> {
    rule: String,
    methods: Vec<Method>,
    regex: Regex,
    build: Box<dyn Fn(&[&str]) -> Option<R> + Send + Sync>,
}

pub struct RouteParser<R> {
    entries: Vec<Entry<R>>,
}

impl<R> Default for RouteParser<R> {
    fn default() -> Self {
        Self { entries: vec![] }
    }
}

/// Anchored regex source for a rule
pub fn rule_pattern(rule: &str) -> String {
    let mut pattern = String::from("^");
    let mut rest = rule;
    while let Some(start) = rest.find('<') {
        pattern.push_str(&regex::escape(&rest[..start]));
        let end = match rest[start..].find('>') {
            Some(end) => start + end,
            None => {
                rest = &rest[start..];
                break;
            }
        };
        if rest[start + 1..end].starts_with("int:") {
            pattern.push_str(r"(\d+)");
        } else {
            pattern.push_str(r"([^/]+)");
        }
        rest = &rest[end + 1..];
    }
    pattern.push_str(&regex::escape(rest));
    pattern.push('$');
    pattern
}

impl<R> RouteParser<R> {
    /// Adds a rule without captures
    pub fn add_route<F>(&mut self, rule: &str, methods: &[Method], f: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.add_route_with_params(rule, methods, move |_| Some(f()));
    }

    /// Adds a rule whose captures are handed to `f`; `None` from `f` means no match
    pub fn add_route_with_params<F>(&mut self, rule: &str, methods: &[Method], f: F)
    where
        F: Fn(&[&str]) -> Option<R> + Send + Sync + 'static,
    {
        let regex = Regex::new(&rule_pattern(rule)).unwrap_or_else(|e| panic!("Invalid route rule {}: {}", rule, e));
        self.entries.push(Entry {
            rule: rule.to_string(),
            methods: methods.to_vec(),
            regex,
            build: Box::new(f),
        });
    }

    /// First route matching `path`, in registration order
    pub fn test(&self, path: &str) -> Option<R> {
        self.entries.iter().filter_map(|entry| entry.matches(path)).next()
    }

    pub fn rules(&self) -> Vec<RouteRule> {
        self.entries
            .iter()
            .map(|entry| RouteRule {
                rule: entry.rule.clone(),
                methods: entry.methods.iter().map(|method| method.to_string()).collect(),
            })
            .collect()
    }
}

impl<R> Entry<R> {
    fn matches(&self, path: &str) -> Option<R> {
        let captures = self.regex.captures(path)?;
        let params: Vec<&str> = captures.iter().skip(1).map(|c| c.map(|c| c.as_str()).unwrap_or("")).collect();
        (self.build)(&params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestRoute {
        Orders,
        Order(i32),
        Export,
    }

    fn parser() -> RouteParser<TestRoute> {
        let mut parser = RouteParser::default();
        parser.add_route("/api/orders", &[Method::Get, Method::Post], || TestRoute::Orders);
        parser.add_route("/api/orders/export.csv", &[Method::Get], || TestRoute::Export);
        parser.add_route_with_params("/api/orders/<int:order_id>", &[Method::Get], |params| {
            params.get(0).and_then(|id| id.parse().ok()).map(TestRoute::Order)
        });
        parser
    }

    #[test]
    fn rules_become_anchored_patterns() {
        assert_eq!(rule_pattern("/api/orders/<int:id>/pay"), r"^/api/orders/(\d+)/pay$");
        assert_eq!(rule_pattern("/a/<name>"), "^/a/([^/]+)$");
        assert_eq!(rule_pattern("/x.csv"), r"^/x\.csv$");
    }

    #[test]
    fn literal_routes_win_over_captures_registered_later() {
        let parser = parser();
        assert_eq!(parser.test("/api/orders"), Some(TestRoute::Orders));
        assert_eq!(parser.test("/api/orders/export.csv"), Some(TestRoute::Export));
        assert_eq!(parser.test("/api/orders/42"), Some(TestRoute::Order(42)));
        assert_eq!(parser.test("/api/orders/abc"), None);
        assert_eq!(parser.test("/api/orders/42/extra"), None);
    }

    #[test]
    fn table_lists_methods() {
        let rules = parser().rules();
        assert_eq!(rules[0].rule, "/api/orders");
        assert_eq!(rules[0].methods, vec!["GET".to_string(), "POST".to_string()]);
    }
}

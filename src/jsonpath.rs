//! JSONPath selection over `serde_json::Value`.
//!
//! Supported: `$`, `.name`, `['name']`, `[n]` (negative counts from the end),
//! `.*` / `[*]`, `[start:end:step]`, unions (`[0,2]`, `['a','b']`), filters
//! (`[?(@.id == 2)]`, `[?(@.tags)]`, joined with `&&` / `||`) and `..`
//! recursive descent.
//!
//! A path built only from member and index selectors is definite and selects
//! exactly one value; anything missing along the way is an error. Every other
//! path selects an array of all matches.

use std::cmp::Ordering;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid syntax at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unknown key {0}")]
    UnknownKey(String),

    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("cannot select {selector} from {found}")]
    WrongKind {
        selector: String,
        found: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(i64),
    Wildcard,
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    Recursive,
    Union(Vec<Member>),
    Filter(FilterExpr),
}

/// One entry of a bracket union.
#[derive(Debug, Clone, PartialEq)]
enum Member {
    Key(String),
    Index(i64),
}

impl Member {
    fn select<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match (self, value) {
            (Member::Key(key), Value::Object(map)) => map.get(key),
            (Member::Index(index), Value::Array(items)) => {
                resolve_index(*index, items.len()).and_then(|i| items.get(i))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn holds(self, left: &Value, right: &Value) -> bool {
        let ord = compare(left, right);
        match self {
            CmpOp::Eq => ord == Some(Ordering::Equal),
            CmpOp::Ne => ord != Some(Ordering::Equal),
            CmpOp::Lt => ord == Some(Ordering::Less),
            CmpOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            CmpOp::Gt => ord == Some(Ordering::Greater),
            CmpOp::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

/// Numbers compare numerically, strings lexically; other values are only
/// ever equal or unordered.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ if left == right => Some(Ordering::Equal),
        _ => None,
    }
}

/// Predicate of a `[?(...)]` selector, evaluated against each candidate `@`.
#[derive(Debug, Clone, PartialEq)]
enum FilterExpr {
    Exists(JsonPath),
    Compare {
        path: JsonPath,
        op: CmpOp,
        literal: Value,
    },
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

impl FilterExpr {
    fn matches(&self, current: &Value) -> bool {
        match self {
            FilterExpr::Exists(path) => !path.candidates(current).is_empty(),
            FilterExpr::Compare { path, op, literal } => path
                .candidates(current)
                .into_iter()
                .any(|v| op.holds(v, literal)),
            FilterExpr::And(l, r) => l.matches(current) && r.matches(current),
            FilterExpr::Or(l, r) => l.matches(current) || r.matches(current),
        }
    }
}

impl Segment {
    fn is_definite(&self) -> bool {
        matches!(self, Segment::Key(_) | Segment::Index(_))
    }
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(expr: &str) -> Result<Self, PathError> {
        Parser::new(expr).parse()
    }

    /// True when the path selects a single value rather than a list.
    pub fn is_definite(&self) -> bool {
        self.segments.iter().all(Segment::is_definite)
    }

    pub fn select(&self, root: &Value) -> Result<Value, PathError> {
        if self.is_definite() {
            return self.select_one(root).cloned();
        }
        let matches = self.select_all(root);
        Ok(Value::Array(matches.into_iter().cloned().collect()))
    }

    /// Every value the path reaches from `root`; a missing definite path
    /// reaches nothing.
    fn candidates<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        if self.is_definite() {
            self.select_one(root).ok().into_iter().collect()
        } else {
            self.select_all(root)
        }
    }

    fn select_one<'a>(&self, root: &'a Value) -> Result<&'a Value, PathError> {
        let mut current = root;
        for seg in &self.segments {
            current = match seg {
                Segment::Key(key) => match current {
                    Value::Object(map) => map
                        .get(key)
                        .ok_or_else(|| PathError::UnknownKey(key.clone()))?,
                    other => {
                        return Err(PathError::WrongKind {
                            selector: format!("key {key}"),
                            found: kind_name(other),
                        });
                    }
                },
                Segment::Index(index) => match current {
                    Value::Array(items) => resolve_index(*index, items.len())
                        .and_then(|i| items.get(i))
                        .ok_or(PathError::IndexOutOfRange {
                            index: *index,
                            len: items.len(),
                        })?,
                    other => {
                        return Err(PathError::WrongKind {
                            selector: format!("index {index}"),
                            found: kind_name(other),
                        });
                    }
                },
                _ => unreachable!("definite paths contain only keys and indices"),
            };
        }
        Ok(current)
    }

    fn select_all<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current: Vec<&Value> = vec![root];
        for seg in &self.segments {
            current = match seg {
                Segment::Key(key) => current
                    .into_iter()
                    .filter_map(|v| v.as_object().and_then(|map| map.get(key)))
                    .collect(),
                Segment::Index(index) => current
                    .into_iter()
                    .filter_map(|v| {
                        let items = v.as_array()?;
                        resolve_index(*index, items.len()).and_then(|i| items.get(i))
                    })
                    .collect(),
                Segment::Wildcard => current
                    .into_iter()
                    .flat_map(|v| match v {
                        Value::Array(items) => items.iter().collect(),
                        Value::Object(map) => map.values().collect(),
                        _ => Vec::new(),
                    })
                    .collect(),
                Segment::Slice { start, end, step } => current
                    .into_iter()
                    .flat_map(|v| match v {
                        Value::Array(items) => slice(items, *start, *end, *step),
                        _ => Vec::new(),
                    })
                    .collect(),
                Segment::Recursive => current
                    .into_iter()
                    .flat_map(|v| {
                        let mut out = Vec::new();
                        descendants(v, &mut out);
                        out
                    })
                    .collect(),
                Segment::Union(members) => current
                    .into_iter()
                    .flat_map(|v| members.iter().filter_map(move |m| m.select(v)))
                    .collect(),
                Segment::Filter(filter) => current
                    .into_iter()
                    .flat_map(|v| match v {
                        Value::Array(items) => {
                            items.iter().filter(|i| filter.matches(i)).collect()
                        }
                        Value::Object(map) => {
                            map.values().filter(|i| filter.matches(i)).collect()
                        }
                        _ => Vec::new(),
                    })
                    .collect(),
            };
        }
        current
    }
}

/// Parse `expr` and select from `root` in one go.
pub fn select(expr: &str, root: &Value) -> Result<Value, PathError> {
    JsonPath::parse(expr)?.select(root)
}

/// Name of the JSON type of `value`, for messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    if (0..len).contains(&i) {
        Some(i as usize)
    } else {
        None
    }
}

fn slice(items: &[Value], start: Option<i64>, end: Option<i64>, step: Option<i64>) -> Vec<&Value> {
    let n = items.len() as i64;
    let step = step.unwrap_or(1);
    if step == 0 || n == 0 {
        return Vec::new();
    }
    let norm = |i: i64| if i < 0 { (n + i).clamp(0, n) } else { i.clamp(0, n) };
    let mut out = Vec::new();
    if step > 0 {
        let (lo, hi) = (norm(start.unwrap_or(0)), norm(end.unwrap_or(n)));
        let mut i = lo;
        while i < hi {
            out.push(&items[i as usize]);
            let Some(next) = i.checked_add(step) else { break };
            i = next;
        }
    } else {
        let hi = start.map(|s| norm(s).min(n - 1)).unwrap_or(n - 1);
        let lo = end.map(norm).unwrap_or(-1);
        let mut i = hi;
        while i > lo && i >= 0 {
            out.push(&items[i as usize]);
            let Some(next) = i.checked_add(step) else { break };
            i = next;
        }
    }
    out
}

fn descendants<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(value);
    match value {
        Value::Array(items) => items.iter().for_each(|v| descendants(v, out)),
        Value::Object(map) => map.values().for_each(|v| descendants(v, out)),
        _ => {}
    }
}

struct Parser<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Parser<'a> {
    fn new(s: &'a str) -> Self {
        Self { s: s.trim(), i: 0 }
    }

    fn parse(&mut self) -> Result<JsonPath, PathError> {
        if !self.consume('$') {
            return Err(self.error("path must start with `$`"));
        }
        let segments = self.segments()?;
        if !self.eof() {
            return Err(self.error("unexpected character"));
        }
        Ok(JsonPath { segments })
    }

    /// Selectors up to the first character that cannot start one.
    fn segments(&mut self) -> Result<Vec<Segment>, PathError> {
        let mut segments = Vec::new();
        loop {
            if self.peek_str("..") {
                self.i += 2;
                segments.push(Segment::Recursive);
                // `..name` and `..*` carry their selector without a dot.
                if self.consume('*') {
                    segments.push(Segment::Wildcard);
                } else if self.peek() != Some('[') {
                    segments.push(Segment::Key(self.identifier()?));
                }
                continue;
            }
            if self.consume('.') {
                if self.consume('*') {
                    segments.push(Segment::Wildcard);
                } else {
                    segments.push(Segment::Key(self.identifier()?));
                }
                continue;
            }
            if self.consume('[') {
                segments.push(self.bracket()?);
                continue;
            }
            return Ok(segments);
        }
    }

    fn bracket(&mut self) -> Result<Segment, PathError> {
        self.skip_ws();
        let seg = if self.consume('*') {
            Segment::Wildcard
        } else if self.consume('?') {
            Segment::Filter(self.filter()?)
        } else if matches!(self.peek(), Some('\'' | '"')) {
            self.quoted_keys()?
        } else {
            let body = self.until(']')?;
            parse_numeric_selector(body)
                .ok_or_else(|| self.error("expected index, slice or union"))?
        };
        self.skip_ws();
        if !self.consume(']') {
            return Err(self.error("expected `]`"));
        }
        Ok(seg)
    }

    /// `'a'` or `'a', 'b', ...`
    fn quoted_keys(&mut self) -> Result<Segment, PathError> {
        let mut keys = vec![self.quoted()?];
        loop {
            self.skip_ws();
            if !self.consume(',') {
                break;
            }
            self.skip_ws();
            keys.push(self.quoted()?);
        }
        if keys.len() == 1 {
            return Ok(Segment::Key(keys.remove(0)));
        }
        Ok(Segment::Union(keys.into_iter().map(Member::Key).collect()))
    }

    fn filter(&mut self) -> Result<FilterExpr, PathError> {
        self.skip_ws();
        let parenthesised = self.consume('(');
        let expr = self.filter_or()?;
        self.skip_ws();
        if parenthesised && !self.consume(')') {
            return Err(self.error("expected `)`"));
        }
        Ok(expr)
    }

    fn filter_or(&mut self) -> Result<FilterExpr, PathError> {
        let mut left = self.filter_and()?;
        loop {
            self.skip_ws();
            if !self.peek_str("||") {
                return Ok(left);
            }
            self.i += 2;
            let right = self.filter_and()?;
            left = FilterExpr::Or(Box::new(left), Box::new(right));
        }
    }

    fn filter_and(&mut self) -> Result<FilterExpr, PathError> {
        let mut left = self.filter_term()?;
        loop {
            self.skip_ws();
            if !self.peek_str("&&") {
                return Ok(left);
            }
            self.i += 2;
            let right = self.filter_term()?;
            left = FilterExpr::And(Box::new(left), Box::new(right));
        }
    }

    fn filter_term(&mut self) -> Result<FilterExpr, PathError> {
        self.skip_ws();
        if self.consume('(') {
            let expr = self.filter_or()?;
            self.skip_ws();
            if !self.consume(')') {
                return Err(self.error("expected `)`"));
            }
            return Ok(expr);
        }
        if !self.consume('@') {
            return Err(self.error("filter operand must start with `@`"));
        }
        let path = JsonPath {
            segments: self.segments()?,
        };
        self.skip_ws();
        let Some(op) = self.operator() else {
            return Ok(FilterExpr::Exists(path));
        };
        self.skip_ws();
        let literal = self.literal()?;
        Ok(FilterExpr::Compare { path, op, literal })
    }

    fn operator(&mut self) -> Option<CmpOp> {
        let (op, len) = [
            ("==", CmpOp::Eq),
            ("!=", CmpOp::Ne),
            ("<=", CmpOp::Le),
            (">=", CmpOp::Ge),
            ("<", CmpOp::Lt),
            (">", CmpOp::Gt),
        ]
        .into_iter()
        .find(|(lit, _)| self.peek_str(lit))
        .map(|(lit, op)| (op, lit.len()))?;
        self.i += len;
        Some(op)
    }

    /// Quoted string, number, `true`, `false` or `null`.
    fn literal(&mut self) -> Result<Value, PathError> {
        if matches!(self.peek(), Some('\'' | '"')) {
            return self.quoted().map(Value::String);
        }
        let start = self.i;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ')' | ']' | '&' | '|') {
                break;
            }
            self.i += c.len_utf8();
        }
        let token = &self.s[start..self.i];
        match token {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" => Ok(Value::Null),
            _ => token
                .parse::<i64>()
                .map(Value::from)
                .ok()
                .or_else(|| {
                    token
                        .parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                })
                .ok_or_else(|| self.error("expected a literal")),
        }
    }

    fn identifier(&mut self) -> Result<String, PathError> {
        let start = self.i;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
        if self.i == start {
            return Err(self.error("identifier expected"));
        }
        Ok(self.s[start..self.i].to_string())
    }

    fn quoted(&mut self) -> Result<String, PathError> {
        let Some(quote) = self.peek().filter(|c| matches!(c, '\'' | '"')) else {
            return Err(self.error("expected quoted key"));
        };
        self.i += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.i += c.len_utf8();
            if c == quote {
                return Ok(out);
            }
            if c == '\\' {
                let Some(escaped) = self.peek() else { break };
                self.i += escaped.len_utf8();
                out.push(escaped);
            } else {
                out.push(c);
            }
        }
        Err(self.error("unterminated string"))
    }

    fn until(&mut self, end: char) -> Result<&'a str, PathError> {
        let s: &'a str = self.s;
        let rest = &s[self.i..];
        match rest.find(end) {
            Some(offset) => {
                self.i += offset;
                Ok(&rest[..offset])
            }
            None => Err(self.error(&format!("expected `{end}`"))),
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.i += c.len_utf8();
        }
    }

    fn consume(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    fn peek_str(&self, lit: &str) -> bool {
        self.s[self.i..].starts_with(lit)
    }

    fn eof(&self) -> bool {
        self.i >= self.s.len()
    }

    fn error(&self, message: &str) -> PathError {
        PathError::Syntax {
            offset: self.i,
            message: message.to_string(),
        }
    }
}

fn parse_numeric_selector(body: &str) -> Option<Segment> {
    let body = body.trim();
    if body.contains(',') {
        return body
            .split(',')
            .map(|part| part.trim().parse().ok().map(Member::Index))
            .collect::<Option<Vec<_>>>()
            .map(Segment::Union);
    }
    if !body.contains(':') {
        return body.parse().ok().map(Segment::Index);
    }
    let parts: Vec<&str> = body.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    let bound = |s: Option<&&str>| -> Option<Option<i64>> {
        match s.map(|s| s.trim()) {
            None | Some("") => Some(None),
            Some(t) => t.parse().ok().map(Some),
        }
    };
    Some(Segment::Slice {
        start: bound(parts.first())?,
        end: bound(parts.get(1))?,
        step: bound(parts.get(2))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "a": "a",
            "b": 2,
            "list": [10, 20, 30, 40],
            "users": [
                {"name": "ann", "age": 31, "tags": ["x"]},
                {"name": "bob", "age": 25, "tags": []},
                {"name": "cy", "age": 40}
            ],
            "odd key": {"n": null}
        })
    }

    #[test]
    fn root_selects_whole_document() {
        assert_eq!(select("$", &doc()).unwrap(), doc());
    }

    #[test]
    fn member_and_index_access() {
        let d = doc();
        assert_eq!(select("$.a", &d).unwrap(), json!("a"));
        assert_eq!(select("$.list[1]", &d).unwrap(), json!(20));
        assert_eq!(select("$.list[-1]", &d).unwrap(), json!(40));
        assert_eq!(select("$.users[0].name", &d).unwrap(), json!("ann"));
        assert_eq!(select("$['odd key'].n", &d).unwrap(), Value::Null);
        assert_eq!(select(r#"$["users"][1]["name"]"#, &d).unwrap(), json!("bob"));
    }

    #[test]
    fn missing_member_is_an_error() {
        assert_eq!(
            select("$.nope", &doc()),
            Err(PathError::UnknownKey("nope".into()))
        );
    }

    #[test]
    fn index_out_of_range_is_an_error() {
        assert_eq!(
            select("$.list[9]", &doc()),
            Err(PathError::IndexOutOfRange { index: 9, len: 4 })
        );
    }

    #[test]
    fn selecting_into_a_scalar_is_an_error() {
        let err = select("$.a.b", &doc()).unwrap_err();
        assert!(matches!(err, PathError::WrongKind { found: "string", .. }));
    }

    #[test]
    fn wildcard_collects_matches() {
        let d = doc();
        assert_eq!(select("$.users[*].name", &d).unwrap(), json!(["ann", "bob", "cy"]));
        assert_eq!(select("$.users.*.name", &d).unwrap(), json!(["ann", "bob", "cy"]));
        assert_eq!(select("$.users[*].missing", &d).unwrap(), json!([]));
    }

    #[test]
    fn slices() {
        let d = doc();
        assert_eq!(select("$.list[1:3]", &d).unwrap(), json!([20, 30]));
        assert_eq!(select("$.list[::2]", &d).unwrap(), json!([10, 30]));
        assert_eq!(select("$.list[-2:]", &d).unwrap(), json!([30, 40]));
        assert_eq!(select("$.list[::-1]", &d).unwrap(), json!([40, 30, 20, 10]));
    }

    #[test]
    fn recursive_descent() {
        let d = doc();
        assert_eq!(select("$..name", &d).unwrap(), json!(["ann", "bob", "cy"]));
    }

    #[test]
    fn unions() {
        let d = doc();
        assert_eq!(select("$.list[0,2]", &d).unwrap(), json!([10, 30]));
        assert_eq!(select("$.list[3, -4, 9]", &d).unwrap(), json!([40, 10]));
        assert_eq!(select("$['a','b']", &d).unwrap(), json!(["a", 2]));
        assert_eq!(select("$.users[0,1].name", &d).unwrap(), json!(["ann", "bob"]));
        assert_eq!(select(r#"$["a", "missing"]"#, &d).unwrap(), json!(["a"]));
    }

    #[test]
    fn filters_compare_against_literals() {
        let d = doc();
        assert_eq!(select("$.users[?(@.name=='bob')].age", &d).unwrap(), json!([25]));
        assert_eq!(select("$.users[?(@.age > 30)].name", &d).unwrap(), json!(["ann", "cy"]));
        assert_eq!(select("$.users[?(@.age <= 31)].name", &d).unwrap(), json!(["ann", "bob"]));
        assert_eq!(select(r#"$.users[?(@.name != "ann")].name"#, &d).unwrap(), json!(["bob", "cy"]));
        assert_eq!(select("$.list[?(@ >= 30)]", &d).unwrap(), json!([30, 40]));
        assert_eq!(select("$.list[?(@ == 20.0)]", &d).unwrap(), json!([20]));
        assert_eq!(select("$.users[?(@.age == 'old')]", &d).unwrap(), json!([]));
    }

    #[test]
    fn filters_test_existence_and_combine() {
        let d = doc();
        assert_eq!(select("$.users[?(@.tags)].name", &d).unwrap(), json!(["ann", "bob"]));
        assert_eq!(select("$.users[?(@.tags[0])].name", &d).unwrap(), json!(["ann"]));
        assert_eq!(
            select("$.users[?(@.age > 30 && @.tags)].name", &d).unwrap(),
            json!(["ann"])
        );
        assert!(select("$.users[?(@.name == 'bob' || !@.x)].name", &d).is_err());
        assert_eq!(
            select("$.users[?(@.name == 'bob' || (@.age > 35))].name", &d).unwrap(),
            json!(["bob", "cy"])
        );
        assert_eq!(select("$..[?(@.age < 30)].name", &d).unwrap(), json!(["bob"]));
        assert!(!JsonPath::parse("$.users[?(@.age)]").unwrap().is_definite());
    }

    #[test]
    fn huge_slice_steps_terminate() {
        let d = doc();
        assert_eq!(
            select("$.list[1::9223372036854775807]", &d).unwrap(),
            json!([20])
        );
        assert_eq!(
            select("$.list[::-9223372036854775808]", &d).unwrap(),
            json!([40])
        );
    }

    #[test]
    fn definiteness() {
        assert!(JsonPath::parse("$.a[0]['b']").unwrap().is_definite());
        assert!(!JsonPath::parse("$.a[*]").unwrap().is_definite());
        assert!(!JsonPath::parse("$..a").unwrap().is_definite());
    }

    #[test]
    fn syntax_errors() {
        for bad in [
            "a.b",
            "$.",
            "$[",
            "$[abc]",
            "$['x'",
            "$.a b",
            "$[1:2:3:4]",
            "$[0,x]",
            "$['a',]",
            "$[?(@.a ==)]",
            "$[?(name == 1)]",
            "$[?(@.a == 1]",
        ] {
            assert!(
                matches!(JsonPath::parse(bad), Err(PathError::Syntax { .. })),
                "{bad} should not parse"
            );
        }
    }
}

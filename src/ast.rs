use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};

/// 过滤规格的根节点, 按插入顺序保存每个字段的过滤条件
///
/// 顺序决定了生成的 WHERE 条件以及参数列表的顺序。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterSpec {
    pub fields: Vec<FieldFilter>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个字段条件, 便于链式构造
    pub fn with(mut self, path: impl Into<FieldPath>, condition: impl Into<Condition>) -> Self {
        self.push(path, condition);
        self
    }

    pub fn push(&mut self, path: impl Into<FieldPath>, condition: impl Into<Condition>) {
        self.fields.push(FieldFilter {
            field: path.into(),
            condition: condition.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

/// 代表对单个字段的过滤条件, 例如：`"a.b": ["gt(1)", "lt(9)"]`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: FieldPath,
    pub condition: Condition,
}

/// 以点分隔的字段路径, 例如 `"a.b.c"`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(pub String);

impl FieldPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 按 `.` 切分后的各级字段名
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// 参数名的基础部分：去掉所有的点, `"a.b.c"` -> `"abc"`
    ///
    /// 参数名中不能出现的其他字符也一并去掉; 结果为空时使用 `"p"`。
    pub fn identifier(&self) -> String {
        let id: String = self
            .0
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if id.is_empty() {
            "p".to_string()
        } else {
            id
        }
    }
}

impl From<&str> for FieldPath {
    fn from(s: &str) -> Self {
        FieldPath(s.to_string())
    }
}

impl From<String> for FieldPath {
    fn from(s: String) -> Self {
        FieldPath(s)
    }
}

/// 字段上的条件: 单个表达式, 或一组表达式
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// 标量值或单个范围表达式
    Single(FilterExpr),
    /// 表达式列表; 全部是相等比较时用 OR 连接, 否则用 AND
    List(Vec<FilterExpr>),
}

impl From<FilterExpr> for Condition {
    fn from(expr: FilterExpr) -> Self {
        Condition::Single(expr)
    }
}

impl From<Vec<FilterExpr>> for Condition {
    fn from(exprs: Vec<FilterExpr>) -> Self {
        Condition::List(exprs)
    }
}

impl From<&str> for Condition {
    fn from(s: &str) -> Self {
        Condition::Single(FilterExpr::Equals(Literal::from(s)))
    }
}

/// 单个过滤表达式, 在过滤规格的边界处只解析一次
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Equals(Literal),
    LessThan(i64),
    LessOrEqual(i64),
    GreaterThan(i64),
    GreaterOrEqual(i64),
}

impl FilterExpr {
    pub fn op(&self) -> CompOp {
        match self {
            FilterExpr::Equals(_) => CompOp::Eq,
            FilterExpr::LessThan(_) => CompOp::Lt,
            FilterExpr::LessOrEqual(_) => CompOp::Lte,
            FilterExpr::GreaterThan(_) => CompOp::Gt,
            FilterExpr::GreaterOrEqual(_) => CompOp::Gte,
        }
    }

    /// 拆成运算符和字面量
    pub fn parsed(&self) -> ParsedValue {
        let literal = match self {
            FilterExpr::Equals(literal) => literal.clone(),
            FilterExpr::LessThan(n)
            | FilterExpr::LessOrEqual(n)
            | FilterExpr::GreaterThan(n)
            | FilterExpr::GreaterOrEqual(n) => Literal::Number(Number::from(*n)),
        };
        ParsedValue { op: self.op(), literal }
    }
}

/// 解析后的表达式: 运算符加字面量
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValue {
    pub op: CompOp,
    pub literal: Literal,
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,  // =
    Lt,  // <
    Lte, // <=
    Gt,  // >
    Gte, // >=
}

impl CompOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompOp::Eq => "=",
            CompOp::Lt => "<",
            CompOp::Lte => "<=",
            CompOp::Gt => ">",
            CompOp::Gte => ">=",
        }
    }

    pub fn is_relational(&self) -> bool {
        !matches!(self, CompOp::Eq)
    }
}

/// 字面量值, 字符串、数字和布尔值保持原有类型
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(Number),
    Bool(bool),
}

impl Literal {
    pub fn to_json(&self) -> Value {
        match self {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Number(n) => Value::Number(n.clone()),
            Literal::Bool(b) => Value::Bool(*b),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Number(Number::from(n))
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

/// 查询选项, 键名大小写与调用方约定一致; 未知的键会被忽略
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct QueryOptions {
    #[serde(rename = "LIMIT", default)]
    pub limit: Option<u64>,
    #[serde(rename = "OFFSET", default)]
    pub offset: Option<u64>,
    #[serde(rename = "ORDERBY", default, deserialize_with = "lenient_string")]
    pub order_by: Option<String>,
    #[serde(rename = "SORTBY", default, deserialize_with = "lenient_string")]
    pub sort_by: Option<String>,
}

/// 排序选项只取字符串, 其他类型的值当作未设置
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Ok(Some(s)),
        None | Some(Value::Null) => Ok(None),
        Some(other) => {
            tracing::debug!(value = %other, "ignoring non-string sort option");
            Ok(None)
        }
    }
}

impl QueryOptions {
    /// `TOP` 的值: LIMIT 与 OFFSET 之和, 偏移量需要在客户端丢弃
    pub fn top(&self) -> u64 {
        self.limit.unwrap_or(0).saturating_add(self.offset())
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }

    /// 非空的排序字段
    pub fn order_by(&self) -> Option<&str> {
        self.order_by.as_deref().filter(|s| !s.is_empty())
    }

    /// 只接受完全匹配的 `"ASC"` / `"DESC"`
    pub fn sort_order(&self) -> Option<SortOrder> {
        match self.sort_by.as_deref() {
            Some("ASC") => Some(SortOrder::Asc),
            Some("DESC") => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

//! 校验关卡
//! 实体的增删改查先按操作名运行规则集，失败时返回字段级错误且不执行任何写入

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

/// 规则集按操作名索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Read,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Read => "read",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个字段的校验错误
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub rule: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, rule: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            rule: rule.to_string(),
            message: message.into(),
        }
    }

    /// 把 validator 的结果展开为字段错误列表
    pub fn collect(result: Result<(), ValidationErrors>) -> Vec<FieldError> {
        let Err(errors) = result else {
            return Vec::new();
        };

        errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: field.to_string(),
                    rule: e.code.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} failed rule {}", field, e.code)),
                })
            })
            .collect()
    }
}

/// 结构化校验失败，携带规则集、操作和字段错误
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub rule_set: String,
    pub operation: Operation,
    pub errors: Vec<FieldError>,
}

impl ValidationFailure {
    /// 出错的字段名（去重，按字母序）
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.errors.iter().map(|e| e.field.as_str()).collect();
        fields.dedup();
        fields
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn has_rule(&self, field: &str, rule: &str) -> bool {
        self.errors.iter().any(|e| e.field == field && e.rule == rule)
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Validation failed for {}.{}: {}",
            self.rule_set,
            self.operation,
            self.fields().join(", ")
        )
    }
}

/// 实体的规则集
pub trait RuleSet {
    /// 规则集名称，例如 "user"
    fn rule_set(&self) -> &'static str;

    /// 对给定操作运行规则，返回全部字段错误
    fn check(&self, op: Operation) -> Vec<FieldError>;
}

/// 运行规则集，失败时不允许继续执行写操作
pub fn gate<T: RuleSet + ?Sized>(op: Operation, value: &T) -> Result<(), AppError> {
    gate_with(op, value, Vec::new())
}

/// 同 [`gate`]，并合并调用方额外发现的字段错误（唯一性、密码策略等）
pub fn gate_with<T: RuleSet + ?Sized>(
    op: Operation,
    value: &T,
    extra: Vec<FieldError>,
) -> Result<(), AppError> {
    let mut errors = value.check(op);
    errors.extend(extra);

    if errors.is_empty() {
        return Ok(());
    }

    errors.sort();
    errors.dedup();

    let failure = ValidationFailure {
        rule_set: value.rule_set().to_string(),
        operation: op,
        errors,
    };

    tracing::debug!(
        rule_set = %failure.rule_set,
        operation = %op,
        fields = ?failure.fields(),
        "Validation gate rejected input"
    );

    Err(AppError::Validation(failure))
}

/// 删除与读取只校验主键
#[derive(Debug, Validate)]
pub struct EntityKey {
    rule_set: &'static str,
    #[validate(range(min = 1, message = "id must be a positive integer"))]
    id: i64,
}

impl EntityKey {
    pub fn new(rule_set: &'static str, id: i64) -> Self {
        Self { rule_set, id }
    }
}

impl RuleSet for EntityKey {
    fn rule_set(&self) -> &'static str {
        self.rule_set
    }

    fn check(&self, _op: Operation) -> Vec<FieldError> {
        FieldError::collect(self.validate())
    }
}

/// 必填字符串字段
pub(crate) fn require(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "required", format!("{} is required", field)));
    }
}

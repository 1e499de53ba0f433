// ==========================================
// 病房床位分配系统 - 需求模型调用
// ==========================================
// 职责: 以子进程方式运行外部需求模型, 解析按天分段的输出
// 输出格式: 每行 `patientId,needLevel`, 每天以分隔符行结束
// 失败策略: 非零退出 / 缺少分隔符 / 行格式错误 / 超时 → 整次运行失败
// ==========================================

use crate::config::{AllocationConfigReader, ConfigResult};
use crate::engine::workspace::Workspace;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// 工作区路径环境变量（同时作为最后一个命令行参数传入）
pub const WORKSPACE_ENV: &str = "BED_ALLOC_WORKSPACE";

/// 按天分段的需求: 下标 = 天偏移, 元素 = (患者ID, 需求等级)
pub type DailyNeeds = Vec<Vec<(String, u32)>>;

/// 需求模型错误
#[derive(Error, Debug)]
pub enum NeedsModelError {
    #[error("需求模型启动失败 (command={command}): {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("需求模型异常退出: status={status:?}, stderr={stderr}")]
    NonZeroExit { status: Option<i32>, stderr: String },

    #[error("需求模型输出格式错误: {0}")]
    MalformedOutput(String),

    #[error("需求模型执行超时: {0}秒")]
    Timeout(u64),
}

// ==========================================
// NeedsModel Trait
// ==========================================
// 实现者: ProcessNeedsModel（外部可执行文件）; 测试中可替换为 mock
#[async_trait]
pub trait NeedsModel: Send + Sync {
    /// 基于工作区计算按天需求
    async fn compute_needs(&self, workspace: &Workspace) -> Result<DailyNeeds, NeedsModelError>;
}

// ==========================================
// ProcessNeedsModel - 子进程实现
// ==========================================
#[derive(Debug, Clone)]
pub struct ProcessNeedsModel {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    delimiter: String,
}

impl ProcessNeedsModel {
    pub fn new(command: &str, args: Vec<String>, timeout: Duration, delimiter: &str) -> Self {
        Self {
            command: command.to_string(),
            args,
            timeout,
            delimiter: delimiter.to_string(),
        }
    }

    /// 从配置构建
    pub async fn from_config<C>(config: &C) -> ConfigResult<Self>
    where
        C: AllocationConfigReader + ?Sized,
    {
        Ok(Self::new(
            &config.get_needs_command().await?,
            config.get_needs_args().await?,
            Duration::from_secs(config.get_needs_timeout_secs().await?),
            &config.get_needs_day_delimiter().await?,
        ))
    }
}

#[async_trait]
impl NeedsModel for ProcessNeedsModel {
    async fn compute_needs(&self, workspace: &Workspace) -> Result<DailyNeeds, NeedsModelError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .arg(workspace.path())
            .env(WORKSPACE_ENV, workspace.path())
            .current_dir(workspace.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(command = %self.command, workspace = %workspace.path().display(), "启动需求模型");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| NeedsModelError::Spawn {
                command: self.command.clone(),
                source,
            })?,
            Err(_) => return Err(NeedsModelError::Timeout(self.timeout.as_secs())),
        };

        if !output.status.success() {
            return Err(NeedsModelError::NonZeroExit {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let needs = parse_needs_output(&stdout, &self.delimiter)?;

        tracing::info!(days = needs.len(), "需求模型计算完成");
        Ok(needs)
    }
}

// ==========================================
// 输出解析
// ==========================================

/// 解析需求模型输出
///
/// # 规则
/// - 分隔符行结束一天; 至少需要一个分隔符
/// - 最后一个分隔符之后的非空内容视为最后一天
/// - 需求等级为 0 的行被忽略
pub fn parse_needs_output(text: &str, delimiter: &str) -> Result<DailyNeeds, NeedsModelError> {
    let mut days: DailyNeeds = Vec::new();
    let mut current: Vec<(String, u32)> = Vec::new();
    let mut seen_delimiter = false;
    let mut trailing_lines = 0usize;

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line == delimiter {
            days.push(std::mem::take(&mut current));
            seen_delimiter = true;
            trailing_lines = 0;
            continue;
        }

        let (patient_id, need) = line.split_once(',').ok_or_else(|| {
            NeedsModelError::MalformedOutput(format!("第{}行缺少逗号: {}", line_no + 1, line))
        })?;
        let patient_id = patient_id.trim();
        if patient_id.is_empty() {
            return Err(NeedsModelError::MalformedOutput(format!(
                "第{}行患者ID为空",
                line_no + 1
            )));
        }
        let need: u32 = need.trim().parse().map_err(|_| {
            NeedsModelError::MalformedOutput(format!(
                "第{}行需求等级无效: {}",
                line_no + 1,
                need.trim()
            ))
        })?;

        trailing_lines += 1;
        if need > 0 {
            current.push((patient_id.to_string(), need));
        }
    }

    if !seen_delimiter {
        return Err(NeedsModelError::MalformedOutput(format!(
            "输出中缺少日分隔符 {}",
            delimiter
        )));
    }
    if trailing_lines > 0 {
        days.push(current);
    }

    Ok(days)
}

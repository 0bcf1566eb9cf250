//! 传感器轮询调度器
//!
//! 一组具名周期任务（超声波距离、温度、CPU 负载、舵机扫描），随连接状态整体启用/停用。
//!
//! 调度器本身是纯数据结构：不持有线程、不做 IO，时间由调用方传入。
//! IO 线程在每次循环中调用 [`PollingScheduler::poll_due`] 取出到期任务的指令并写出。
//!
//! # 定时器语义
//!
//! 每个启用的任务恰好有一个"定时器"，即下一次到期时刻（`deadline`）。
//! `enable_all` 只为未启用的任务布置新定时器，`disable_all` 清除全部定时器，
//! 因此任意顺序的启用/停用之后每个任务至多有一个定时器。

use crate::error::DriverError;
use crate::state::ConnectionState;
use rover_protocol::Command;
use smallvec::SmallVec;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::trace;

/// 超声波距离任务名
pub const SONIC_TASK: &str = "sonic";
/// 温度任务名
pub const TEMPERATURE_TASK: &str = "temperature";
/// CPU 负载任务名
pub const CPU_LOAD_TASK: &str = "cpu_load";
/// 舵机扫描任务名
pub const SERVO_SWEEP_TASK: &str = "servo_sweep";

/// 轮询周期上限
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// 一次 tick 产生的指令（通常不超过 4 条，避免堆分配）
pub type PollBatch = SmallVec<[Command; 4]>;

/// 舵机扫描状态
///
/// 每个 tick 发出当前角度，然后向当前方向前进 `step_deg`，
/// 到达边界（含）时反向。角度始终夹在 `[min_angle, max_angle]` 内。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServoSweep {
    channel: u8,
    angle: i32,
    min_angle: i32,
    max_angle: i32,
    step_deg: i32,
    increasing: bool,
}

impl ServoSweep {
    pub const DEFAULT_CHANNEL: u8 = 0;
    pub const DEFAULT_MIN_ANGLE: i32 = 45;
    pub const DEFAULT_MAX_ANGLE: i32 = 65;
    pub const DEFAULT_STEP_DEG: i32 = 5;

    /// 创建扫描状态
    ///
    /// # 错误
    ///
    /// - `min_angle > max_angle`
    /// - `step_deg <= 0`
    pub fn new(
        channel: u8,
        start_angle: i32,
        min_angle: i32,
        max_angle: i32,
        step_deg: i32,
    ) -> Result<Self, DriverError> {
        if min_angle > max_angle {
            return Err(DriverError::InvalidConfig(format!(
                "servo bounds inverted: [{min_angle}, {max_angle}]"
            )));
        }
        if step_deg <= 0 {
            return Err(DriverError::InvalidConfig(format!(
                "servo step must be positive, got {step_deg}"
            )));
        }
        let angle = start_angle.clamp(min_angle, max_angle);
        Ok(Self {
            channel,
            angle,
            min_angle,
            max_angle,
            step_deg,
            increasing: angle < max_angle,
        })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// 下一个 tick 将发出的角度
    pub fn angle(&self) -> i32 {
        self.angle
    }

    pub fn is_increasing(&self) -> bool {
        self.increasing
    }

    pub fn bounds(&self) -> (i32, i32) {
        (self.min_angle, self.max_angle)
    }

    /// 前进一步，返回新角度
    pub fn advance(&mut self) -> i32 {
        if self.increasing {
            self.angle = (self.angle + self.step_deg).min(self.max_angle);
            if self.angle >= self.max_angle {
                self.increasing = false;
            }
        } else {
            self.angle = (self.angle - self.step_deg).max(self.min_angle);
            if self.angle <= self.min_angle {
                self.increasing = true;
            }
        }
        self.angle
    }
}

impl Default for ServoSweep {
    fn default() -> Self {
        Self {
            channel: Self::DEFAULT_CHANNEL,
            angle: Self::DEFAULT_MIN_ANGLE,
            min_angle: Self::DEFAULT_MIN_ANGLE,
            max_angle: Self::DEFAULT_MAX_ANGLE,
            step_deg: Self::DEFAULT_STEP_DEG,
            increasing: true,
        }
    }
}

/// 任务类型（决定每个 tick 产生哪些指令）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollKind {
    /// `CMD_SONIC`
    Sonic,
    /// `CMD_TEMPERATURE`
    Temperature,
    /// `CMD_CPU_LOAD`
    CpuLoad,
    /// `CMD_SERVO#<ch>#<angle>` + `CMD_SONIC`
    ServoSweep(ServoSweep),
}

impl PollKind {
    fn build_into(&mut self, out: &mut PollBatch) {
        match self {
            PollKind::Sonic => out.push(Command::sonic()),
            PollKind::Temperature => out.push(Command::temperature()),
            PollKind::CpuLoad => out.push(Command::cpu_load()),
            PollKind::ServoSweep(sweep) => {
                out.push(Command::servo(sweep.channel, sweep.angle));
                sweep.advance();
                out.push(Command::sonic());
            },
        }
    }
}

/// 任务定义（配置项）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTaskSpec {
    pub name: String,
    pub interval: Duration,
    pub kind: PollKind,
}

/// 轮询任务集配置
///
/// 默认包含四个任务：
///
/// | 任务 | 周期 |
/// |------|------|
/// | `sonic` | 1000 ms |
/// | `temperature` | 2000 ms |
/// | `cpu_load` | 2000 ms |
/// | `servo_sweep` | 1000 ms（通道 0，45°..65°，步长 5°） |
///
/// # 示例
///
/// ```rust
/// use rover_driver::scheduler::{PollingConfig, CPU_LOAD_TASK, SERVO_SWEEP_TASK};
///
/// // 不扫描舵机、不查询 CPU 的变体
/// let config = PollingConfig::default()
///     .without_task(SERVO_SWEEP_TASK)
///     .without_task(CPU_LOAD_TASK);
/// assert_eq!(config.tasks().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    tasks: Vec<PollTaskSpec>,
}

impl PollingConfig {
    /// 空任务集
    pub fn empty() -> Self {
        Self { tasks: Vec::new() }
    }

    /// 追加任务
    pub fn with_task(mut self, name: impl Into<String>, interval: Duration, kind: PollKind) -> Self {
        self.tasks.push(PollTaskSpec {
            name: name.into(),
            interval,
            kind,
        });
        self
    }

    /// 移除任务（不存在时无操作）
    pub fn without_task(mut self, name: &str) -> Self {
        self.tasks.retain(|t| t.name != name);
        self
    }

    /// 修改已有任务的周期（不存在时无操作）
    pub fn with_interval(mut self, name: &str, interval: Duration) -> Self {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.name == name) {
            task.interval = interval;
        }
        self
    }

    pub fn tasks(&self) -> &[PollTaskSpec] {
        &self.tasks
    }

    /// 校验：任务名非空且唯一，周期在 (0, `MAX_POLL_INTERVAL`] 内
    pub fn validate(&self) -> Result<(), DriverError> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.name.is_empty() {
                return Err(DriverError::InvalidConfig("poll task name is empty".to_string()));
            }
            if !seen.insert(task.name.as_str()) {
                return Err(DriverError::InvalidConfig(format!(
                    "duplicate poll task name: {}",
                    task.name
                )));
            }
            if task.interval.is_zero() {
                return Err(DriverError::InvalidConfig(format!(
                    "poll task {} has zero interval",
                    task.name
                )));
            }
            if task.interval > MAX_POLL_INTERVAL {
                return Err(DriverError::InvalidConfig(format!(
                    "poll task {} interval {:?} exceeds {:?}",
                    task.name, task.interval, MAX_POLL_INTERVAL
                )));
            }
        }
        Ok(())
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self::empty()
            .with_task(SONIC_TASK, Duration::from_millis(1000), PollKind::Sonic)
            .with_task(TEMPERATURE_TASK, Duration::from_millis(2000), PollKind::Temperature)
            .with_task(CPU_LOAD_TASK, Duration::from_millis(2000), PollKind::CpuLoad)
            .with_task(
                SERVO_SWEEP_TASK,
                Duration::from_millis(1000),
                PollKind::ServoSweep(ServoSweep::default()),
            )
    }
}

/// 运行时任务
#[derive(Debug, Clone)]
pub struct PollTask {
    name: String,
    interval: Duration,
    kind: PollKind,
    /// 已布置的定时器（下一次到期时刻），None 表示停用
    deadline: Option<Instant>,
}

impl PollTask {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn kind(&self) -> &PollKind {
        &self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// 轮询调度器
#[derive(Debug, Clone)]
pub struct PollingScheduler {
    tasks: Vec<PollTask>,
}

impl PollingScheduler {
    /// 按配置创建调度器（所有任务初始为停用）
    pub fn new(config: PollingConfig) -> Result<Self, DriverError> {
        config.validate()?;
        let tasks = config
            .tasks
            .into_iter()
            .map(|task| PollTask {
                name: task.name,
                interval: task.interval,
                kind: task.kind,
                deadline: None,
            })
            .collect();
        Ok(Self { tasks })
    }

    /// 启用全部任务（幂等）
    ///
    /// 已启用的任务保持原定时器；停用的任务布置 `now + interval`。
    pub fn enable_all(&mut self, now: Instant) {
        for task in &mut self.tasks {
            if task.deadline.is_none() {
                task.deadline = Some(now + task.interval);
            }
        }
    }

    /// 停用全部任务（幂等）
    pub fn disable_all(&mut self) {
        for task in &mut self.tasks {
            task.deadline = None;
        }
    }

    /// 取出到期任务的指令
    ///
    /// 到期任务重新布置定时器（`deadline + interval`；落后超过一个周期时为 `now + interval`）。
    /// 仅当 `state == Connected` 时产生指令，否则本次 tick 静默跳过（舵机角度不变）。
    pub fn poll_due(&mut self, now: Instant, state: ConnectionState) -> PollBatch {
        let mut out = PollBatch::new();
        for task in &mut self.tasks {
            let Some(deadline) = task.deadline else {
                continue;
            };
            if deadline > now {
                continue;
            }

            let next = deadline + task.interval;
            task.deadline = Some(if next <= now { now + task.interval } else { next });

            if state.is_connected() {
                trace!("Poll task {} due", task.name);
                task.kind.build_into(&mut out);
            }
        }
        out
    }

    /// 最近的到期时刻（无启用任务时为 None）
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.iter().filter_map(|t| t.deadline).min()
    }

    /// 已布置的定时器数量
    pub fn active_timer_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.deadline.is_some()).count()
    }

    /// 指定任务是否启用（不存在时为 false）
    pub fn is_enabled(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t.name == name && t.is_enabled())
    }

    pub fn tasks(&self) -> &[PollTask] {
        &self.tasks
    }

    /// 第一个舵机扫描任务的状态
    pub fn servo(&self) -> Option<&ServoSweep> {
        self.tasks.iter().find_map(|t| match &t.kind {
            PollKind::ServoSweep(sweep) => Some(sweep),
            _ => None,
        })
    }
}

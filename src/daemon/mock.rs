//! Mock 守护进程（进程内模拟，无需真机）
//!
//! 用原子开关控制每类调用是否失败，并统计每类调用次数；演示程序与测试共用。
//! `crash()` 模拟守护进程崩溃：进程停止、连接断开。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::core::DaemonError;
use crate::daemon::{ActionDispatch, ConnectionState, DaemonLifecycle, DaemonSession};
use crate::hotpath::Action;

#[derive(Debug)]
pub struct MockDaemon {
    running: AtomicBool,
    state: RwLock<ConnectionState>,
    last_rules: RwLock<Option<String>>,

    injector_available: AtomicBool,
    fail_start: AtomicBool,
    fail_connect: AtomicBool,
    connect_stalls: AtomicBool,
    fail_restart: AtomicBool,
    fail_configure: AtomicBool,
    fail_actions: AtomicBool,
    crash_on_action: AtomicBool,

    start_calls: AtomicUsize,
    connect_calls: AtomicUsize,
    restart_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    configure_calls: AtomicUsize,
    stop_automation_calls: AtomicUsize,
    daemon_action_calls: AtomicUsize,
    hot_path_action_calls: AtomicUsize,
}

impl Default for MockDaemon {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDaemon {
    /// 初始：进程未启动、未连接、直注入不可用
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            state: RwLock::new(ConnectionState::Disconnected),
            last_rules: RwLock::new(None),
            injector_available: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            connect_stalls: AtomicBool::new(false),
            fail_restart: AtomicBool::new(false),
            fail_configure: AtomicBool::new(false),
            fail_actions: AtomicBool::new(false),
            crash_on_action: AtomicBool::new(false),
            start_calls: AtomicUsize::new(0),
            connect_calls: AtomicUsize::new(0),
            restart_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            configure_calls: AtomicUsize::new(0),
            stop_automation_calls: AtomicUsize::new(0),
            daemon_action_calls: AtomicUsize::new(0),
            hot_path_action_calls: AtomicUsize::new(0),
        }
    }

    /// 已启动且已连接
    pub fn ready() -> Self {
        let daemon = Self::new();
        daemon.running.store(true, Ordering::SeqCst);
        daemon.set_state(ConnectionState::Ready);
        daemon
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// 模拟崩溃：进程退出、连接断开
    pub fn crash(&self) {
        tracing::debug!("MockDaemon crashed");
        self.running.store(false, Ordering::SeqCst);
        self.set_state(ConnectionState::Disconnected);
    }

    pub fn set_injector_available(&self, available: bool) {
        self.injector_available.store(available, Ordering::SeqCst);
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// connect 返回成功，但连接状态停留在 Connecting
    pub fn set_connect_stalls(&self, stalls: bool) {
        self.connect_stalls.store(stalls, Ordering::SeqCst);
    }

    pub fn set_fail_restart(&self, fail: bool) {
        self.fail_restart.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_configure(&self, fail: bool) {
        self.fail_configure.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_actions(&self, fail: bool) {
        self.fail_actions.store(fail, Ordering::SeqCst);
    }

    /// 下一次动作执行失败并使守护进程崩溃（一次性）
    pub fn set_crash_on_action(&self, crash: bool) {
        self.crash_on_action.store(crash, Ordering::SeqCst);
    }

    pub fn last_rules(&self) -> Option<String> {
        self.last_rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn restart_calls(&self) -> usize {
        self.restart_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn configure_calls(&self) -> usize {
        self.configure_calls.load(Ordering::SeqCst)
    }

    pub fn stop_automation_calls(&self) -> usize {
        self.stop_automation_calls.load(Ordering::SeqCst)
    }

    pub fn daemon_action_calls(&self) -> usize {
        self.daemon_action_calls.load(Ordering::SeqCst)
    }

    pub fn hot_path_action_calls(&self) -> usize {
        self.hot_path_action_calls.load(Ordering::SeqCst)
    }

    fn run_action(&self, action: &Action) -> Result<(), String> {
        if self.crash_on_action.swap(false, Ordering::SeqCst) {
            self.crash();
            return Err(format!("daemon crashed while executing {action}"));
        }
        if self.fail_actions.load(Ordering::SeqCst) {
            return Err(format!("injection rejected: {action}"));
        }
        Ok(())
    }
}

#[async_trait]
impl DaemonLifecycle for MockDaemon {
    async fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn start(&self) -> Result<(), DaemonError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(DaemonError::StartFailed("mock start failure".to_string()));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn restart(&self) -> Result<(), DaemonError> {
        self.restart_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_restart.load(Ordering::SeqCst) {
            return Err(DaemonError::RestartFailed("mock restart failure".to_string()));
        }
        self.running.store(true, Ordering::SeqCst);
        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    async fn stop(&self) -> Result<(), DaemonError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }
}

#[async_trait]
impl DaemonSession for MockDaemon {
    fn connection_state(&self) -> ConnectionState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn connect(&self) -> Result<(), DaemonError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.running.load(Ordering::SeqCst) {
            return Err(DaemonError::ConnectFailed("daemon not running".to_string()));
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            self.set_state(ConnectionState::Failed("mock connect failure".to_string()));
            return Err(DaemonError::ConnectFailed("mock connect failure".to_string()));
        }
        if self.connect_stalls.load(Ordering::SeqCst) {
            self.set_state(ConnectionState::Connecting);
        } else {
            self.set_state(ConnectionState::Ready);
        }
        Ok(())
    }

    async fn configure_hot_path(&self, serialized_rules: &str) -> Result<(), DaemonError> {
        self.configure_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_configure.load(Ordering::SeqCst) {
            return Err(DaemonError::ConfigureFailed("mock configure failure".to_string()));
        }
        *self
            .last_rules
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(serialized_rules.to_string());
        Ok(())
    }

    async fn stop_automation(&self) -> Result<(), DaemonError> {
        self.stop_automation_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ActionDispatch for MockDaemon {
    fn is_daemon_available(&self) -> bool {
        self.injector_available.load(Ordering::SeqCst) && self.connection_state().is_ready()
    }

    async fn execute_daemon_action(&self, action: &Action) -> Result<(), String> {
        self.daemon_action_calls.fetch_add(1, Ordering::SeqCst);
        self.run_action(action)
    }

    async fn execute_hot_path_action(&self, action: &Action) -> Result<(), String> {
        self.hot_path_action_calls.fetch_add(1, Ordering::SeqCst);
        self.run_action(action)
    }
}

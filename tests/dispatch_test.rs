// 派发流程集成测试：用脚本化的宿主替代 Win32

#[cfg(test)]
mod dispatch_integration_tests {
    use ilauncher_cl::channel::{CommandPayload, CommandSender};
    use ilauncher_cl::config::DispatchConfig;
    use ilauncher_cl::elevation::{DirectLauncher, SessionLauncher, SessionUser, TaskTrigger};
    use ilauncher_cl::error::{SessionLaunchError, TaskError};
    use ilauncher_cl::execute;
    use ilauncher_cl::invocation::Invocation;
    use ilauncher_cl::locator::ControlSurface;
    use ilauncher_cl::stream::{Chunk, Listen, OutputConsole, PipeFactory, PipeName, Race, ResultPipe};
    use ilauncher_cl::wait::{WorkerOpener, WorkerProcess};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::io;
    use std::time::Duration;

    struct Worker {
        exit_code: u32,
    }

    impl WorkerProcess for Worker {
        fn wait(&self) -> io::Result<()> {
            Ok(())
        }

        fn exit_code(&self) -> io::Result<u32> {
            Ok(self.exit_code)
        }
    }

    /// 每条消息一次连接；消息用完后 worker 退出
    struct ScriptedPipe {
        name: PipeName,
        messages: VecDeque<String>,
        current: Option<Vec<u16>>,
    }

    impl ResultPipe for ScriptedPipe {
        type Worker = Worker;

        fn name(&self) -> &PipeName {
            &self.name
        }

        fn listen(&mut self) -> io::Result<Listen> {
            Ok(Listen::Pending)
        }

        fn wait_connection(&mut self, _worker: &Worker) -> io::Result<Race> {
            match self.messages.pop_front() {
                Some(message) => {
                    self.current = Some(message.encode_utf16().collect());
                    Ok(Race::Connected)
                }
                None => Ok(Race::WorkerExited),
            }
        }

        fn cancel_listen(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn read(&mut self, buf: &mut [u16]) -> io::Result<Chunk> {
            let units = self.current.take().unwrap_or_default();
            buf[..units.len()].copy_from_slice(&units);
            Ok(Chunk::Complete(units.len()))
        }

        fn disconnect(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct ScriptedHost {
        thread_id: u32,
        window_after_start: bool,
        window_present: Cell<bool>,
        task_error: Option<TaskError>,
        direct_ok: bool,
        reply: isize,
        exit_code: u32,
        messages: Vec<String>,
        sent: RefCell<Vec<CommandPayload>>,
        started: RefCell<Vec<(String, String)>>,
        session_result: Option<SessionLaunchError>,
    }

    impl ScriptedHost {
        fn running(reply: isize) -> Self {
            Self {
                thread_id: 1,
                window_after_start: true,
                window_present: Cell::new(true),
                task_error: None,
                direct_ok: true,
                reply,
                exit_code: 0,
                messages: Vec::new(),
                sent: RefCell::new(Vec::new()),
                started: RefCell::new(Vec::new()),
                session_result: None,
            }
        }
    }

    impl ControlSurface for ScriptedHost {
        type Window = u32;

        fn find_window(&self, _class_name: &str) -> Option<u32> {
            self.window_present.get().then_some(0x1234)
        }

        fn pause(&self, _interval: Duration) {}
    }

    impl CommandSender for ScriptedHost {
        fn send_command(&self, _window: u32, payload: &CommandPayload) -> isize {
            self.sent.borrow_mut().push(payload.clone());
            self.reply
        }
    }

    impl WorkerOpener for ScriptedHost {
        type Worker = Worker;

        fn open_worker(&self, _pid: u32) -> io::Result<Worker> {
            Ok(Worker { exit_code: self.exit_code })
        }
    }

    impl PipeFactory for ScriptedHost {
        type Pipe = ScriptedPipe;

        fn instance_id(&self) -> u32 {
            self.thread_id
        }

        fn create_pipe(&self, name: &PipeName, _sddl: &str) -> io::Result<ScriptedPipe> {
            Ok(ScriptedPipe {
                name: name.clone(),
                messages: self.messages.iter().cloned().collect(),
                current: None,
            })
        }
    }

    impl OutputConsole for ScriptedHost {
        fn ensure_output(&self) -> bool {
            true
        }
    }

    impl TaskTrigger for ScriptedHost {
        fn run_task(&self, _folder: &str, task: &str, _argument: &str) -> Result<(), TaskError> {
            match &self.task_error {
                Some(TaskError::TaskMissing(_)) => Err(TaskError::TaskMissing(task.to_string())),
                Some(_) => Err(TaskError::Connect("access denied".to_string())),
                None => {
                    self.window_present.set(self.window_after_start);
                    Ok(())
                }
            }
        }
    }

    impl DirectLauncher for ScriptedHost {
        fn launch_direct(&self, program: &str, arguments: &str) -> io::Result<u32> {
            self.started
                .borrow_mut()
                .push((program.to_string(), arguments.to_string()));
            if self.direct_ok {
                self.window_present.set(self.window_after_start);
                Ok(4000)
            } else {
                Err(io::Error::new(io::ErrorKind::NotFound, "target missing"))
            }
        }

        fn allow_foreground(&self, _pid: u32) -> io::Result<()> {
            Ok(())
        }
    }

    impl SessionLauncher for ScriptedHost {
        fn launch_in_session_as(
            &self,
            _user: SessionUser,
            _elevated: bool,
            command_line: &str,
        ) -> Result<u32, SessionLaunchError> {
            self.started
                .borrow_mut()
                .push(("session".to_string(), command_line.to_string()));
            match &self.session_result {
                Some(SessionLaunchError::NoActiveSession) => Err(SessionLaunchError::NoActiveSession),
                Some(_) => Err(SessionLaunchError::CreateProcess("denied".to_string())),
                None => Ok(77),
            }
        }
    }

    fn run(host: &ScriptedHost, raw: &str) -> (i32, String) {
        let config = DispatchConfig::default();
        let mut out = Vec::new();
        let code = execute(host, &config, Invocation::parse(raw), &mut out);
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_empty_and_unknown_invocations_do_nothing() {
        let host = ScriptedHost::running(1);
        assert_eq!(run(&host, "").0, 0);
        assert_eq!(run(&host, "/x").0, 0);
        assert_eq!(run(&host, "/elevate").0, 0);
        assert!(host.sent.borrow().is_empty());
    }

    #[test]
    fn test_wait_passes_worker_exit_code_through() {
        let mut host = ScriptedHost::running(4242);
        host.exit_code = 7;

        let (code, out) = run(&host, "*Scripts\\build.cs arg");

        assert_eq!(code, 7);
        assert!(out.is_empty());
        let sent = host.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text(), "Scripts\\build.cs arg");
        assert_eq!(sent[0].mode().bits(), 1);
    }

    #[test]
    fn test_streaming_relays_every_message_in_order() {
        let mut host = ScriptedHost::running(4242);
        host.exit_code = 3;
        host.messages = vec!["line 1\r\n".into(), "行 2\r\n".into(), "done".into()];

        let (code, out) = run(&host, "**name foo");

        assert_eq!(code, 3);
        assert_eq!(out, "line 1\r\n行 2\r\ndone");
        assert_eq!(host.sent.borrow()[0].text(), r"\\.\pipe\ilauncher-cl-1 name foo");
    }

    #[test]
    fn test_worker_exiting_before_connecting_still_returns_exit_code() {
        let mut host = ScriptedHost::running(4242);
        host.exit_code = 9;

        let (code, out) = run(&host, "**script");

        assert_eq!(code, 9);
        assert!(out.is_empty());
    }

    #[test]
    fn test_pipe_names_differ_between_instances() {
        let mut first = ScriptedHost::running(-2);
        first.thread_id = 100;
        let mut second = ScriptedHost::running(-2);
        second.thread_id = 200;

        run(&first, "**x");
        run(&second, "**x");

        let a = first.sent.borrow()[0].text().to_string();
        let b = second.sent.borrow()[0].text().to_string();
        assert_ne!(a, b);
        assert!(a.starts_with(r"\\.\pipe\ilauncher-cl-100 "));
    }

    #[test]
    fn test_target_started_on_first_miss() {
        let host = ScriptedHost::running(10);
        host.window_present.set(false);

        assert_eq!(run(&host, "script").0, 10);
        assert!(host.started.borrow().is_empty());
        assert_eq!(host.sent.borrow().len(), 1);
    }

    #[test]
    fn test_target_never_appears() {
        let mut host = ScriptedHost::running(10);
        host.window_present.set(false);
        host.window_after_start = false;

        assert_eq!(run(&host, "*script").0, -10);
        assert!(host.sent.borrow().is_empty());
    }

    #[test]
    fn test_target_cannot_be_started() {
        let mut host = ScriptedHost::running(10);
        host.window_present.set(false);
        host.task_error = Some(TaskError::TaskMissing(String::new()));
        host.direct_ok = false;

        assert_eq!(run(&host, "script").0, -10);
    }

    #[test]
    fn test_elevate_falls_back_to_direct_start() {
        let mut host = ScriptedHost::running(0);
        host.task_error = Some(TaskError::TaskMissing(String::new()));

        let (code, _) = run(&host, "/e *script");

        assert_eq!(code, 4);
        assert_eq!(
            host.started.borrow().as_slice(),
            &[("iLauncher.exe".to_string(), "/n *script".to_string())]
        );
    }

    #[test]
    fn test_elevate_reports_failure_when_nothing_starts() {
        let mut host = ScriptedHost::running(0);
        host.task_error = Some(TaskError::Connect(String::new()));
        host.direct_ok = false;

        assert_eq!(run(&host, "/e").0, -1);
    }

    #[test]
    fn test_elevated_start_succeeds() {
        let host = ScriptedHost::running(0);
        assert_eq!(run(&host, "/e").0, 0);
        assert!(host.started.borrow().is_empty());
    }

    #[test]
    fn test_session_launch_exit_codes() {
        let host = ScriptedHost::running(0);
        assert_eq!(run(&host, "/s $(Arg0)").0, 0);
        assert_eq!(
            host.started.borrow().as_slice(),
            &[("session".to_string(), "iLauncher.exe /n".to_string())]
        );

        let mut host = ScriptedHost::running(0);
        host.session_result = Some(SessionLaunchError::NoActiveSession);
        assert_eq!(run(&host, "/s").0, 1);

        let mut host = ScriptedHost::running(0);
        host.session_result = Some(SessionLaunchError::CreateProcess(String::new()));
        assert_eq!(run(&host, "/s").0, 4);
    }
}

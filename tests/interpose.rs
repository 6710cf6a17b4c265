//! End-to-end tests for the interposer
//!
//! The originals are replaced by scripted `SocketOps` implementations and
//! trace lines are read back from a `CaptureSink`.

use std::ffi::c_void;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::thread;

use libc::{c_int, nfds_t, pollfd, size_t, ssize_t};
use rsocket_trace::interposer::Result;
use rsocket_trace::{CaptureSink, Interposer, InterposerError, ResolvedSymbols, SocketOps, Symbol, TraceSink};

fn set_errno(value: c_int) {
	unsafe { *libc::__errno_location() = value };
}

fn errno() -> c_int {
	unsafe { *libc::__errno_location() }
}

/// Strip the timestamp and thread tag from a trace line
fn message(line: &str) -> &str {
	let start = line.find("]: ").expect("trace line has a tag") + 3;
	&line[start..]
}

type PollScript = Box<dyn Fn(&mut [pollfd]) -> c_int + Send + Sync>;

/// Originals that return fixed results
struct ScriptedOps {
	ret: ssize_t,
	errno: c_int,
	fill: u8,
	last_buf: Arc<AtomicPtr<c_void>>,
	poll: PollScript,
}

impl ScriptedOps {
	fn returning(ret: ssize_t, errno: c_int) -> Self {
		Self {
			ret,
			errno,
			fill: 0,
			last_buf: Arc::new(AtomicPtr::new(std::ptr::null_mut())),
			poll: Box::new(|_| 0),
		}
	}

	fn polling(poll: impl Fn(&mut [pollfd]) -> c_int + Send + Sync + 'static) -> Self {
		Self {
			poll: Box::new(poll),
			..Self::returning(0, 0)
		}
	}
}

impl SocketOps for ScriptedOps {
	unsafe fn recv(&self, _socket: c_int, buf: *mut c_void, len: size_t, _flags: c_int) -> Result<ssize_t> {
		self.last_buf.store(buf, Ordering::SeqCst);
		if self.ret > 0 {
			let n = (self.ret as usize).min(len);
			unsafe { std::ptr::write_bytes(buf.cast::<u8>(), self.fill, n) };
		}
		set_errno(self.errno);
		Ok(self.ret)
	}

	unsafe fn send(&self, _socket: c_int, buf: *const c_void, _len: size_t, _flags: c_int) -> Result<ssize_t> {
		self.last_buf.store(buf.cast_mut(), Ordering::SeqCst);
		set_errno(self.errno);
		Ok(self.ret)
	}

	unsafe fn poll(&self, fds: *mut pollfd, nfds: nfds_t, _timeout: c_int) -> Result<c_int> {
		let fds = unsafe { std::slice::from_raw_parts_mut(fds, nfds as usize) };
		Ok((self.poll)(fds))
	}
}

fn interposer(ops: ScriptedOps) -> (Interposer, CaptureSink) {
	let sink = CaptureSink::new();
	let interposer = rsocket_trace::new()
		.ops(ops)
		.sink(sink.clone())
		.program_name("interpose-test")
		.build()
		.expect("valid configuration");
	(interposer, sink)
}

fn pfd(fd: c_int, events: i16, revents: i16) -> pollfd {
	pollfd { fd, events, revents }
}

#[test]
fn successful_recv_is_traced() {
	let mut ops = ScriptedOps::returning(42, 0);
	ops.fill = 0x5a;
	let last_buf = ops.last_buf.clone();
	let (interposer, sink) = interposer(ops);

	let mut buf = [0u8; 100];
	let ret = unsafe { interposer.recv(5, buf.as_mut_ptr().cast(), buf.len(), 0) }.unwrap();

	assert_eq!(ret, 42);
	assert_eq!(last_buf.load(Ordering::SeqCst), buf.as_mut_ptr().cast::<c_void>());
	assert!(buf[..42].iter().all(|&b| b == 0x5a));
	assert!(buf[42..].iter().all(|&b| b == 0));

	let lines = sink.lines();
	assert_eq!(lines.len(), 1);
	let expected = format!("rrecv rsocket 5 len 100 buf {:p} ret 42\n", buf.as_ptr());
	assert_eq!(message(&lines[0]), expected);
}

#[test]
fn failed_recv_reports_errno() {
	let (interposer, sink) = interposer(ScriptedOps::returning(-1, libc::EACCES));

	let mut buf = [0u8; 100];
	let ret = unsafe { interposer.recv(5, buf.as_mut_ptr().cast(), buf.len(), 0) }.unwrap();

	assert_eq!(ret, -1);
	assert_eq!(errno(), libc::EACCES);

	let lines = sink.lines();
	assert_eq!(lines.len(), 1);
	let msg = message(&lines[0]);
	assert!(msg.starts_with("rrecv rsocket 5 len 100 buf "), "{msg}");
	assert!(msg.ends_with(" ret -1 errno 13 (Permission denied)\n"), "{msg}");
}

#[test]
fn send_passes_buffer_through() {
	let ops = ScriptedOps::returning(3, 0);
	let last_buf = ops.last_buf.clone();
	let (interposer, sink) = interposer(ops);

	let payload = *b"abc";
	let ret = unsafe { interposer.send(9, payload.as_ptr().cast(), payload.len(), libc::MSG_DONTWAIT) }.unwrap();

	assert_eq!(ret, 3);
	assert_eq!(last_buf.load(Ordering::SeqCst).cast_const(), payload.as_ptr().cast::<c_void>());
	assert_eq!(&payload, b"abc");

	let msg = sink.lines().pop().unwrap();
	assert_eq!(message(&msg), format!("rsend rsocket 9 len 3 buf {:p} ret 3\n", payload.as_ptr()));
}

#[test]
fn failed_send_reports_errno() {
	let (interposer, sink) = interposer(ScriptedOps::returning(-1, libc::EAGAIN));

	let ret = unsafe { interposer.send(4, std::ptr::null(), 0, 0) }.unwrap();

	assert_eq!(ret, -1);
	assert_eq!(errno(), libc::EAGAIN);
	let line = sink.lines().pop().unwrap();
	assert_eq!(
		message(&line),
		"rsend rsocket 4 len 0 buf 0x0 ret -1 errno 11 (Resource temporarily unavailable)\n"
	);
}

#[test]
fn failed_recv_uses_platform_wording() {
	let (interposer, sink) = interposer(ScriptedOps::returning(-1, libc::EBADF));

	let ret = unsafe { interposer.recv(8, std::ptr::null_mut(), 16, 0) }.unwrap();

	assert_eq!(ret, -1);
	assert_eq!(errno(), libc::EBADF);
	let line = sink.lines().pop().unwrap();
	assert_eq!(message(&line), "rrecv rsocket 8 len 16 buf 0x0 ret -1 errno 9 (Bad file descriptor)\n");
}

/// Sink that overwrites `errno` on every write, as a failing `write(2)` would
#[derive(Clone, Default)]
struct ErrnoClobberingSink {
	inner: CaptureSink,
}

impl TraceSink for ErrnoClobberingSink {
	fn write_line(&self, line: &str) {
		self.inner.write_line(line);
		set_errno(libc::EPIPE);
	}
}

#[test]
fn errno_survives_tracing() {
	let sink = ErrnoClobberingSink::default();
	let build = |ops: ScriptedOps| {
		rsocket_trace::new()
			.ops(ops)
			.sink(sink.clone())
			.build()
			.unwrap()
	};

	let recv = build(ScriptedOps::returning(-1, libc::ECONNRESET));
	let mut buf = [0u8; 4];
	assert_eq!(unsafe { recv.recv(3, buf.as_mut_ptr().cast(), buf.len(), 0) }.unwrap(), -1);
	assert_eq!(errno(), libc::ECONNRESET);

	let send = build(ScriptedOps::returning(-1, libc::EAGAIN));
	assert_eq!(unsafe { send.send(3, buf.as_ptr().cast(), buf.len(), 0) }.unwrap(), -1);
	assert_eq!(errno(), libc::EAGAIN);

	let poll = build(ScriptedOps::polling(|_| {
		set_errno(libc::EINTR);
		-1
	}));
	let mut fds = [pfd(3, libc::POLLIN, 0)];
	assert_eq!(poll.poll_slice(&mut fds, -1).unwrap(), -1);
	assert_eq!(errno(), libc::EINTR);

	// One line each for recv and send, two for poll.
	assert_eq!(sink.inner.lines().len(), 4);
}

#[test]
fn long_error_descriptions_are_clipped() {
	let sink = CaptureSink::new();
	let interposer = rsocket_trace::new()
		.ops(ScriptedOps::returning(-1, libc::EACCES))
		.sink(sink.clone())
		.error_buffer_len(5)
		.build()
		.unwrap();

	let _ = unsafe { interposer.recv(1, std::ptr::null_mut(), 0, 0) }.unwrap();

	let line = sink.lines().pop().unwrap();
	assert!(line.ends_with("errno 13 (Perm)\n"), "{line}");
}

#[test]
fn poll_traces_requested_and_returned_events() {
	let (interposer, sink) = interposer(ScriptedOps::polling(|fds| {
		fds[0].revents = libc::POLLIN;
		fds[2].revents = libc::POLLOUT | libc::POLLERR;
		2
	}));

	let mut fds = [
		pfd(5, libc::POLLIN, 0),
		pfd(6, 0, 0),
		pfd(7, libc::POLLIN | libc::POLLOUT, 0),
		pfd(-1, libc::POLLIN, 0),
		pfd(0, libc::POLLIN, 0),
	];
	let ret = interposer.poll_slice(&mut fds, 100).unwrap();

	assert_eq!(ret, 2);
	assert_eq!(fds[0].revents, libc::POLLIN);
	assert_eq!(fds[1].revents, 0);
	assert_eq!(fds[2].revents, libc::POLLOUT | libc::POLLERR);

	let lines = sink.lines();
	assert_eq!(lines.len(), 2);
	assert_eq!(message(&lines[0]), "rpoll n 5 5 (POLLIN) 6 () 7 (POLLIN|POLLOUT) \n");
	assert_eq!(message(&lines[1]), "rpoll ret 2 5 (POLLIN) 7 (POLLERR|POLLOUT) \n");
}

#[test]
fn poll_timeout_has_no_returned_groups() {
	let (interposer, sink) = interposer(ScriptedOps::polling(|_| 0));

	let mut fds = [pfd(3, libc::POLLIN, 0)];
	assert_eq!(interposer.poll_slice(&mut fds, 0).unwrap(), 0);

	let lines = sink.lines();
	assert_eq!(message(&lines[1]), "rpoll ret 0 \n");
}

#[test]
fn poll_failure_keeps_errno() {
	let (interposer, sink) = interposer(ScriptedOps::polling(|_| {
		set_errno(libc::EINTR);
		-1
	}));

	let mut fds = [pfd(3, libc::POLLIN, 0)];
	assert_eq!(interposer.poll_slice(&mut fds, -1).unwrap(), -1);
	assert_eq!(errno(), libc::EINTR);
	assert_eq!(message(&sink.lines()[1]), "rpoll ret -1 \n");
}

#[test]
fn pre_poll_line_can_be_disabled() {
	let sink = CaptureSink::new();
	let interposer = rsocket_trace::new()
		.ops(ScriptedOps::polling(|_| 1))
		.sink(sink.clone())
		.log_pre_poll(false)
		.build()
		.unwrap();

	let mut fds = [pfd(3, libc::POLLIN, 0)];
	interposer.poll_slice(&mut fds, 0).unwrap();

	let lines = sink.lines();
	assert_eq!(lines.len(), 1);
	assert!(message(&lines[0]).starts_with("rpoll ret 1"));
}

unsafe extern "C" fn denied_recv(_socket: c_int, _buf: *mut c_void, _len: size_t, _flags: c_int) -> ssize_t {
	set_errno(libc::EACCES);
	-1
}

#[test]
fn resolved_table_forwards_and_reports_gaps() {
	let sink = CaptureSink::new();
	let interposer = rsocket_trace::new()
		.ops(ResolvedSymbols::from_fns(Some(denied_recv), None, None))
		.sink(sink.clone())
		.build()
		.unwrap();

	assert_eq!(interposer.missing_symbols(), vec![Symbol::Send, Symbol::Poll]);

	let ret = unsafe { interposer.recv(5, std::ptr::null_mut(), 100, 0) }.unwrap();
	assert_eq!(ret, -1);
	assert!(sink.lines()[0].ends_with("ret -1 errno 13 (Permission denied)\n"));

	let err = unsafe { interposer.send(5, std::ptr::null(), 100, 0) }.unwrap_err();
	assert!(matches!(err, InterposerError::ResolutionFailed { symbol: "rsend" }));
	assert_eq!(sink.lines().len(), 1);
}

#[test]
fn invalid_buffer_sizes_are_rejected() {
	let err = rsocket_trace::new().event_buffer_len(0).build().unwrap_err();
	assert!(matches!(err, InterposerError::InvalidConfig(_)));

	let err = rsocket_trace::new().error_buffer_len(0).build().unwrap_err();
	assert!(matches!(err, InterposerError::InvalidConfig(_)));
}

#[test]
fn exported_symbols_fail_cleanly_without_rsocket() {
	// Either no interposer is installed yet or the originals are missing;
	// both surface as ENOSYS.
	let mut buf = [0u8; 8];
	let ret = unsafe { rsocket_trace::ffi::rrecv(3, buf.as_mut_ptr().cast(), buf.len(), 0) };
	assert_eq!(ret, -1);
	assert_eq!(errno(), libc::ENOSYS);

	let ret = unsafe { rsocket_trace::ffi::rpoll(std::ptr::null_mut(), 0, 0) };
	assert_eq!(ret, -1);
	assert_eq!(errno(), libc::ENOSYS);
}

#[test]
fn concurrent_callers_get_whole_lines() {
	let (interposer, sink) = interposer(ScriptedOps::returning(1, 0));
	let interposer = Arc::new(interposer);

	let workers: Vec<_> = (0..4)
		.map(|i| {
			let interposer = Arc::clone(&interposer);
			thread::Builder::new()
				.name(format!("sender-{i}"))
				.spawn(move || {
					let byte = [0u8; 1];
					for _ in 0..50 {
						unsafe { interposer.send(10 + i, byte.as_ptr().cast(), 1, 0) }.unwrap();
					}
				})
				.unwrap()
		})
		.collect();
	for worker in workers {
		worker.join().unwrap();
	}

	let lines = sink.lines();
	assert_eq!(lines.len(), 200);
	for line in &lines {
		assert!(line.contains(" [sender-"), "{line}");
		assert!(message(line).starts_with("rsend rsocket 1"), "{line}");
		assert!(line.ends_with(" ret 1\n"), "{line}");
	}
}

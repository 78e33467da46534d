use archive_runtime::errno::{EBADF, EEXIST, EINVAL, EIO, ENOENT, ENOSPC, ENOTDIR, ENOTEMPTY};
use archive_runtime::{DirEntry, FileRuntime, OpenMode, SeekOrigin};
use archive_runtime_mocked::{Fault, IoCall, Vfs, WANT_ERROR};

#[test]
fn open_read_returns_minus_one_if_file_not_found() {
    let vfs = Vfs::new();
    let fd = vfs.open("test", OpenMode::Read);
    assert_eq!(fd, -1);
    assert_eq!(vfs.get_errno(), ENOENT);
}

#[test]
fn open_read_returns_non_negative_if_file_exists() {
    let vfs = Vfs::new();
    vfs.add_file("test", Vec::new());

    let fd = vfs.open("test", OpenMode::Read);

    assert!(fd >= 0);
}

#[test]
fn open_write_returns_minus_one_on_error() {
    let vfs = Vfs::new();

    let fd = vfs.open(&format!("test{WANT_ERROR}"), OpenMode::Write);

    assert_eq!(fd, -1);
    assert_eq!(vfs.get_errno(), EINVAL);
}

#[test]
fn open_write_creates_file() {
    let vfs = Vfs::new();

    // File should not exist before
    assert!(vfs.get_file("test").is_err());

    let fd = vfs.open("test", OpenMode::Write);
    assert!(fd >= 0);

    // File should exist after open
    assert!(vfs.get_file("test").is_ok());
}

#[test]
fn open_write_truncates_and_append_keeps() {
    let vfs = Vfs::new();
    vfs.add_file("log", b"old".to_vec());

    let fd = vfs.open("log", OpenMode::Append);
    assert_eq!(vfs.write(fd, b"+new"), 4);
    assert_eq!(vfs.get_file("log").unwrap(), b"old+new");

    let fd = vfs.open("log", OpenMode::Write);
    assert_eq!(vfs.write(fd, b"fresh"), 5);
    assert_eq!(vfs.get_file("log").unwrap(), b"fresh");
}

#[test]
fn read_only_file_refuses_writers_until_made_writable() {
    let vfs = Vfs::new();
    vfs.add_file("ro", b"x".to_vec());
    vfs.set_read_only("ro", true).unwrap();

    assert_eq!(vfs.open("ro", OpenMode::Write), -1);
    assert_eq!(vfs.make_writable("ro"), 0);
    assert!(vfs.open("ro", OpenMode::Write) >= 0);
}

#[test]
fn close_returns_minus_one_for_invalid_handle() {
    let vfs = Vfs::new();

    let result = vfs.close(999);

    assert_eq!(result, -1);
    assert_eq!(vfs.get_errno(), EBADF);
}

#[test]
fn close_twice_fails_the_second_time() {
    let vfs = Vfs::new();
    let fd = vfs.open("test", OpenMode::Write);

    assert_eq!(vfs.close(fd), 0);
    assert_eq!(vfs.close(fd), -1);
    assert_eq!(vfs.open_handles(), 0);
}

#[test]
fn read_write_seek_tell() {
    let vfs = Vfs::new();
    let fd = vfs.open("data", OpenMode::Write);
    assert_eq!(vfs.write(fd, b"0123456789"), 10);
    assert_eq!(vfs.seek(fd, 2, SeekOrigin::Start), 0);
    assert_eq!(vfs.write(fd, b"ab"), 2);
    assert_eq!(vfs.tell(fd), 4);
    vfs.close(fd);

    let fd = vfs.open("data", OpenMode::Read);
    assert_eq!(vfs.seek(fd, -3, SeekOrigin::End), 0);
    let mut buf = [0u8; 8];
    assert_eq!(vfs.read(fd, &mut buf), 3);
    assert_eq!(&buf[..3], b"789");
    assert_eq!(vfs.read(fd, &mut buf), 0);

    assert_eq!(vfs.get_file("data").unwrap(), b"01ab456789");
}

#[test]
fn write_after_seek_past_end_zero_fills() {
    let vfs = Vfs::new();
    let fd = vfs.open("sparse", OpenMode::Write);
    assert_eq!(vfs.seek(fd, 3, SeekOrigin::Start), 0);
    assert_eq!(vfs.write(fd, b"x"), 1);

    assert_eq!(vfs.get_file("sparse").unwrap(), b"\0\0\0x");
}

#[test]
fn negative_seek_fails() {
    let vfs = Vfs::new();
    let fd = vfs.open("f", OpenMode::Write);

    assert_eq!(vfs.seek(fd, -1, SeekOrigin::Start), -1);
    assert_eq!(vfs.get_errno(), EINVAL);
}

#[test]
fn injected_faults() {
    let vfs = Vfs::new();
    vfs.add_file("in", b"abcdef".to_vec());
    let rfd = vfs.open("in", OpenMode::Read);
    let wfd = vfs.open("out", OpenMode::Write);

    vfs.inject(Fault::ShortRead(2));
    let mut buf = [0u8; 4];
    assert_eq!(vfs.read(rfd, &mut buf), 2);
    assert_eq!(vfs.get_errno(), EIO);

    vfs.inject(Fault::ShortWrite(1));
    assert_eq!(vfs.write(wfd, b"xyz"), 1);
    assert_eq!(vfs.get_errno(), ENOSPC);

    vfs.inject(Fault::FailSeek);
    assert_eq!(vfs.seek(rfd, 0, SeekOrigin::Start), -1);

    vfs.clear_faults();
    vfs.inject(Fault::FailClose);
    assert_eq!(vfs.close(wfd), -1);
    assert_eq!(vfs.get_errno(), EIO);
    assert_eq!(vfs.open_handles(), 1);
}

#[test]
fn unlink_keeps_open_descriptors_working() {
    let vfs = Vfs::new();
    vfs.add_file("gone", b"still here".to_vec());
    let fd = vfs.open("gone", OpenMode::Read);

    assert_eq!(vfs.unlink("gone"), 0);
    assert!(vfs.get_file("gone").is_err());
    assert_eq!(vfs.unlink("gone"), -1);

    let mut buf = [0u8; 10];
    assert_eq!(vfs.read(fd, &mut buf), 10);
    assert_eq!(&buf, b"still here");
}

#[test]
fn call_log_records_requests() {
    let vfs = Vfs::new();
    let fd = vfs.open("f", OpenMode::Write);
    vfs.write(fd, b"abc");
    vfs.write(fd, b"de");
    vfs.close(fd);

    assert_eq!(vfs.writes(), vec![3, 2]);
    assert_eq!(
        vfs.calls().last(),
        Some(&IoCall::Close { fd })
    );
}

fn entry(name: &str, is_dir: bool) -> DirEntry {
    DirEntry {
        name: name.to_string(),
        is_dir,
    }
}

#[test]
fn list_dir_shows_files_and_implicit_subdirectories() {
    let vfs = Vfs::new();
    vfs.add_file("/cfg/User.ini", Vec::new());
    vfs.add_file("/cfg/Save/Save1.usa", Vec::new());
    vfs.add_file("/cfg/Save/Save2.usa", Vec::new());
    vfs.add_file("Local.ini", Vec::new());

    let mut entries = Vec::new();
    assert_eq!(vfs.list_dir("/cfg/", &mut entries), 0);
    assert_eq!(entries, vec![entry("User.ini", false), entry("Save", true)]);

    let mut entries = Vec::new();
    assert_eq!(vfs.list_dir(".", &mut entries), 0);
    assert_eq!(entries, vec![entry("Local.ini", false)]);

    assert_eq!(vfs.list_dir("/cfg/User.ini", &mut Vec::new()), -1);
    assert_eq!(vfs.get_errno(), ENOTDIR);
    assert_eq!(vfs.list_dir("/nowhere", &mut Vec::new()), -1);
    assert_eq!(vfs.get_errno(), ENOENT);
}

#[test]
fn mkdir_and_rmdir_of_an_empty_directory() {
    let vfs = Vfs::new();

    assert_eq!(vfs.mkdir("/cfg/Logs"), 0);
    assert_eq!(vfs.mkdir("/cfg/Logs/"), -1);
    assert_eq!(vfs.get_errno(), EEXIST);

    let mut entries = Vec::new();
    assert_eq!(vfs.list_dir("/cfg", &mut entries), 0);
    assert_eq!(entries, vec![entry("Logs", true)]);

    assert_eq!(vfs.rmdir("/cfg/Logs"), 0);
    assert_eq!(vfs.rmdir("/cfg/Logs"), -1);
    assert_eq!(vfs.get_errno(), ENOENT);
    assert!(vfs
        .calls()
        .contains(&IoCall::Mkdir { path: "/cfg/Logs".to_string() }));
}

#[test]
fn rmdir_refuses_files_and_non_empty_directories() {
    let vfs = Vfs::new();
    vfs.add_file("/cfg/User.ini", Vec::new());

    assert_eq!(vfs.rmdir("/cfg"), -1);
    assert_eq!(vfs.get_errno(), ENOTEMPTY);
    assert_eq!(vfs.rmdir("/cfg/User.ini"), -1);
    assert_eq!(vfs.get_errno(), ENOTDIR);
    assert_eq!(vfs.mkdir("/cfg/User.ini"), -1);
    assert_eq!(vfs.get_errno(), EEXIST);
    assert_eq!(vfs.mkdir(&format!("/bad{WANT_ERROR}")), -1);
    assert_eq!(vfs.get_errno(), EINVAL);
}

//! 致命错误对话框

use windows::core::HSTRING;
use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONERROR, MB_OK};

/// 弹出阻塞的错误消息框，用户确认后返回
pub fn show_error(title: &str, message: &str) {
    unsafe {
        MessageBoxW(None, &HSTRING::from(message), &HSTRING::from(title), MB_OK | MB_ICONERROR);
    }
}

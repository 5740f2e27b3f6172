use crate::errors::AppResult;
use crate::models::{DialogButtons, DialogLevel, DialogOptions, DialogResult};
use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};

/// Blocking presentation of a message box. The host calls this off the async
/// runtime.
pub trait DialogPresenter: Send + Sync {
    fn present(&self, options: &DialogOptions) -> AppResult<DialogResult>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDialogPresenter;

impl DialogPresenter for NativeDialogPresenter {
    fn present(&self, options: &DialogOptions) -> AppResult<DialogResult> {
        let level = match options.level {
            DialogLevel::Info => MessageLevel::Info,
            DialogLevel::Warning => MessageLevel::Warning,
            DialogLevel::Error => MessageLevel::Error,
        };
        let buttons = match options.buttons {
            DialogButtons::Ok => MessageButtons::Ok,
            DialogButtons::OkCancel => MessageButtons::OkCancel,
            DialogButtons::YesNo => MessageButtons::YesNo,
        };

        let answer = MessageDialog::new()
            .set_level(level)
            .set_title(options.title.as_str())
            .set_description(options.message.as_str())
            .set_buttons(buttons)
            .show();

        Ok(interpret_answer(options.buttons, answer))
    }
}

fn interpret_answer(buttons: DialogButtons, answer: MessageDialogResult) -> DialogResult {
    match answer {
        MessageDialogResult::Ok | MessageDialogResult::Yes => DialogResult::confirmed(),
        MessageDialogResult::No | MessageDialogResult::Cancel => DialogResult::dismissed(buttons),
        MessageDialogResult::Custom(label) => {
            let labels = buttons.labels();
            match labels.iter().position(|candidate| candidate.eq_ignore_ascii_case(&label)) {
                Some(0) => DialogResult::confirmed(),
                Some(index) => DialogResult {
                    response: index,
                    confirmed: false,
                },
                None => DialogResult::dismissed(buttons),
            }
        }
    }
}

//! The video input layer: bottom of the stack, consuming only the media
//! transport hotkeys and turning them into player commands.

use super::InputEvent;
use super::keymap::vk;
use crate::player::{CommandQueue, PlayerCommand};

/// Route one event. Only media keys on key-down are consumed; everything
/// else falls through (and off the bottom of the stack).
pub fn handle_input(event: &InputEvent, queue: &CommandQueue) -> bool {
    let InputEvent::Key { key, down: true, .. } = event else {
        return false;
    };
    let command = match key.vk {
        vk::MEDIA_PLAY_PAUSE => PlayerCommand::PlayPause,
        vk::MEDIA_STOP => PlayerCommand::Stop,
        vk::MEDIA_NEXT_TRACK => PlayerCommand::HostInput("next".to_owned()),
        vk::MEDIA_PREV_TRACK => PlayerCommand::HostInput("previous".to_owned()),
        _ => return false,
    };
    queue.push(command);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use crate::input::keymap::KeyTranslation;

    fn key_event(code: i32, down: bool) -> InputEvent {
        InputEvent::Key {
            key: KeyTranslation {
                vk: code,
                native: code,
            },
            down,
            mods: Modifiers::empty(),
        }
    }

    #[test]
    fn play_pause_key_is_consumed() {
        let queue = CommandQueue::new();
        assert!(handle_input(&key_event(vk::MEDIA_PLAY_PAUSE, true), &queue));
        assert_eq!(queue.drain(), vec![PlayerCommand::PlayPause]);
    }

    #[test]
    fn track_keys_route_to_the_playback_manager() {
        let queue = CommandQueue::new();
        assert!(handle_input(&key_event(vk::MEDIA_NEXT_TRACK, true), &queue));
        assert_eq!(
            queue.drain(),
            vec![PlayerCommand::HostInput("next".to_owned())]
        );
    }

    #[test]
    fn other_keys_fall_through() {
        let queue = CommandQueue::new();
        assert!(!handle_input(&key_event(0x41, true), &queue));
        // Key release of a media key also falls through.
        assert!(!handle_input(&key_event(vk::MEDIA_STOP, false), &queue));
        assert!(queue.drain().is_empty());
    }
}

//! CEC user control codes for remote-button presses

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

macro_rules! remote_buttons {
    ($($variant:ident = $code:literal => $name:literal,)+) => {
        /// A key from the CEC user control code table.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum RemoteButton {
            $($variant,)+
        }

        impl RemoteButton {
            pub const ALL: &'static [RemoteButton] = &[$(RemoteButton::$variant,)+];

            /// Operand of `<User Control Pressed>`.
            pub fn code(self) -> u8 {
                match self {
                    $(RemoteButton::$variant => $code,)+
                }
            }

            /// Snake-case name accepted by [`FromStr`].
            pub fn name(self) -> &'static str {
                match self {
                    $(RemoteButton::$variant => $name,)+
                }
            }
        }
    };
}

remote_buttons! {
    Select = 0x00 => "select",
    Up = 0x01 => "up",
    Down = 0x02 => "down",
    Left = 0x03 => "left",
    Right = 0x04 => "right",
    RightUp = 0x05 => "right_up",
    RightDown = 0x06 => "right_down",
    LeftUp = 0x07 => "left_up",
    LeftDown = 0x08 => "left_down",
    RootMenu = 0x09 => "root_menu",
    SetupMenu = 0x0A => "setup_menu",
    ContentsMenu = 0x0B => "contents_menu",
    FavoriteMenu = 0x0C => "favorite_menu",
    Exit = 0x0D => "exit",
    TopMenu = 0x10 => "top_menu",
    DvdMenu = 0x11 => "dvd_menu",
    NumberEntryMode = 0x1D => "number_entry_mode",
    Number11 = 0x1E => "number_11",
    Number12 = 0x1F => "number_12",
    Number0 = 0x20 => "number_0",
    Number1 = 0x21 => "number_1",
    Number2 = 0x22 => "number_2",
    Number3 = 0x23 => "number_3",
    Number4 = 0x24 => "number_4",
    Number5 = 0x25 => "number_5",
    Number6 = 0x26 => "number_6",
    Number7 = 0x27 => "number_7",
    Number8 = 0x28 => "number_8",
    Number9 = 0x29 => "number_9",
    Dot = 0x2A => "dot",
    Enter = 0x2B => "enter",
    Clear = 0x2C => "clear",
    NextFavorite = 0x2F => "next_favorite",
    ChannelUp = 0x30 => "channel_up",
    ChannelDown = 0x31 => "channel_down",
    PreviousChannel = 0x32 => "previous_channel",
    SoundSelect = 0x33 => "sound_select",
    InputSelect = 0x34 => "input_select",
    DisplayInformation = 0x35 => "display_information",
    Help = 0x36 => "help",
    PageUp = 0x37 => "page_up",
    PageDown = 0x38 => "page_down",
    Power = 0x40 => "power",
    VolumeUp = 0x41 => "volume_up",
    VolumeDown = 0x42 => "volume_down",
    Mute = 0x43 => "mute",
    Play = 0x44 => "play",
    Stop = 0x45 => "stop",
    Pause = 0x46 => "pause",
    Record = 0x47 => "record",
    Rewind = 0x48 => "rewind",
    FastForward = 0x49 => "fast_forward",
    Eject = 0x4A => "eject",
    Forward = 0x4B => "forward",
    Backward = 0x4C => "backward",
    StopRecord = 0x4D => "stop_record",
    PauseRecord = 0x4E => "pause_record",
    Angle = 0x50 => "angle",
    SubPicture = 0x51 => "sub_picture",
    VideoOnDemand = 0x52 => "video_on_demand",
    ElectronicProgramGuide = 0x53 => "electronic_program_guide",
    TimerProgramming = 0x54 => "timer_programming",
    InitialConfiguration = 0x55 => "initial_configuration",
    SelectBroadcastType = 0x56 => "select_broadcast_type",
    SelectSoundPresentation = 0x57 => "select_sound_presentation",
    PlayFunction = 0x60 => "play_function",
    PausePlayFunction = 0x61 => "pause_play_function",
    RecordFunction = 0x62 => "record_function",
    PauseRecordFunction = 0x63 => "pause_record_function",
    StopFunction = 0x64 => "stop_function",
    MuteFunction = 0x65 => "mute_function",
    RestoreVolumeFunction = 0x66 => "restore_volume_function",
    TuneFunction = 0x67 => "tune_function",
    SelectMediaFunction = 0x68 => "select_media_function",
    SelectAvInputFunction = 0x69 => "select_av_input_function",
    SelectAudioInputFunction = 0x6A => "select_audio_input_function",
    PowerToggleFunction = 0x6B => "power_toggle_function",
    PowerOffFunction = 0x6C => "power_off_function",
    PowerOnFunction = 0x6D => "power_on_function",
    F1Blue = 0x71 => "f1_blue",
    F2Red = 0x72 => "f2_red",
    F3Green = 0x73 => "f3_green",
    F4Yellow = 0x74 => "f4_yellow",
    F5 = 0x75 => "f5",
    Data = 0x76 => "data",
}

impl FromStr for RemoteButton {
    type Err = ProtocolError;

    /// Case-insensitive; `-` and spaces count as `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        RemoteButton::ALL
            .iter()
            .copied()
            .find(|button| button.name() == normalized)
            .ok_or_else(|| ProtocolError::UnknownRemoteButton(s.to_string()))
    }
}

impl fmt::Display for RemoteButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

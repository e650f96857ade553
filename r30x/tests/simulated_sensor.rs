//! End-to-end tests against a simulated sensor module.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use r30x::protocol::{Frame, PacketType, decode_frame, encode_frame};
use r30x::{CharBuffer, ConfirmationCode, Phase, ReceiverConfig, ScriptedPort, Session};

const ADDRESS: u32 = 0xFFFF_FFFF;
const PASSWORD: u32 = 0x0000_0000;
const LIBRARY_SIZE: u16 = 1000;
const CHUNK: usize = 128;

#[derive(Default)]
struct Sensor {
    finger_present: bool,
    image: Vec<u8>,
    buffers: [Option<Vec<u8>>; 2],
    library: BTreeMap<u16, Vec<u8>>,
    uploading: bool,
    uploaded: Vec<u8>,
    commands: Vec<u8>,
}

impl Sensor {
    fn ack(code: u8, data: &[u8]) -> Vec<u8> {
        let mut payload = vec![code];
        payload.extend_from_slice(data);
        encode_frame(ADDRESS, PacketType::Ack, &payload)
    }

    fn stream(data: &[u8]) -> Vec<u8> {
        let chunks: Vec<&[u8]> = data.chunks(CHUNK).collect();
        let mut out = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let ty = if i + 1 == chunks.len() {
                PacketType::EndData
            } else {
                PacketType::Data
            };
            out.extend(encode_frame(ADDRESS, ty, chunk));
        }
        out
    }

    fn system_parameters() -> Vec<u8> {
        let mut data = vec![0u8; 64];
        data[4..6].copy_from_slice(&LIBRARY_SIZE.to_be_bytes());
        data[6..8].copy_from_slice(&3u16.to_be_bytes());
        data[8..12].copy_from_slice(&ADDRESS.to_be_bytes());
        data[12..14].copy_from_slice(&2u16.to_be_bytes());
        data[14..16].copy_from_slice(&6u16.to_be_bytes());
        data[28..32].copy_from_slice(b"R307");
        data
    }

    fn handle(&mut self, written: &[u8]) -> Vec<u8> {
        let frame = decode_frame(written).expect("host sent a malformed frame");
        match frame.packet_type {
            PacketType::Command => self.command(&frame),
            PacketType::Data | PacketType::EndData if self.uploading => {
                self.uploaded
                    .extend_from_slice(&frame.payload);
                if frame.packet_type == PacketType::EndData {
                    self.uploading = false;
                }
                Vec::new()
            },
            _ => Self::ack(0x01, &[]),
        }
    }

    fn command(&mut self, frame: &Frame) -> Vec<u8> {
        let opcode = frame.opcode().unwrap_or_default();
        let params = frame.body();
        self.commands.push(opcode);

        match opcode {
            0x13 => {
                let password = u32::from_be_bytes([params[0], params[1], params[2], params[3]]);
                Self::ack(if password == PASSWORD { 0x00 } else { 0x13 }, &[])
            },
            0x16 => {
                let mut out = Self::ack(0x00, &[]);
                out.extend(Self::stream(&Self::system_parameters()));
                out
            },
            0x01 if self.finger_present => {
                self.image = (0..4096u32).map(|i| (i % 251) as u8).collect();
                Self::ack(0x00, &[])
            },
            0x01 => Self::ack(0x02, &[]),
            0x02 => {
                let index = usize::from(params[0]) - 1;
                self.buffers[index] = Some(self.image[..512].to_vec());
                Self::ack(0x00, &[])
            },
            0x05 => match &self.buffers {
                [Some(_), Some(_)] => Self::ack(0x00, &[]),
                _ => Self::ack(0x0A, &[]),
            },
            0x06 => {
                let index = usize::from(params[0]) - 1;
                let page = u16::from_be_bytes([params[1], params[2]]);
                match self.buffers[index].clone() {
                    Some(template) => {
                        self.library.insert(page, template);
                        Self::ack(0x00, &[])
                    },
                    None => Self::ack(0x18, &[]),
                }
            },
            0x0A => {
                let mut out = Self::ack(0x00, &[]);
                out.extend(Self::stream(&self.image));
                out
            },
            0x0B => {
                self.uploading = true;
                self.uploaded.clear();
                Self::ack(0x00, &[])
            },
            0x0C => {
                let start = u16::from_be_bytes([params[0], params[1]]);
                let count = u16::from_be_bytes([params[2], params[3]]);
                self.library
                    .retain(|page, _| *page < start || *page >= start + count);
                Self::ack(0x00, &[])
            },
            0x0D => {
                self.library.clear();
                Self::ack(0x00, &[])
            },
            0x1D => {
                let count = u16::try_from(self.library.len()).unwrap_or(u16::MAX);
                Self::ack(0x00, &count.to_be_bytes())
            },
            0x34 => match self.library.keys().next() {
                Some(page) if self.finger_present => {
                    let mut data = page.to_be_bytes().to_vec();
                    data.extend_from_slice(&180u16.to_be_bytes());
                    Self::ack(0x00, &data)
                },
                _ => Self::ack(0x09, &[]),
            },
            _ => Self::ack(0x19, &[]),
        }
    }
}

fn simulated(read_limit: usize) -> (ScriptedPort, Arc<Mutex<Sensor>>) {
    let _ = env_logger::builder()
        .is_test(true)
        .try_init();
    let sensor = Arc::new(Mutex::new(Sensor::default()));
    let handle = Arc::clone(&sensor);
    let port = ScriptedPort::new()
        .with_read_limit(read_limit)
        .with_responder(move |written| handle.lock().unwrap().handle(written));
    (port, sensor)
}

fn fast() -> ReceiverConfig {
    ReceiverConfig {
        retry_sleep: Duration::ZERO,
        ..ReceiverConfig::default()
    }
}

#[test]
fn test_initialize_reads_system_parameters() {
    let (mut port, _sensor) = simulated(7);
    let mut session = Session::new(&mut port).with_receiver_config(fast());

    let params = session
        .initialize(PASSWORD, ADDRESS)
        .unwrap();
    assert_eq!(params.library_size, LIBRARY_SIZE);
    assert_eq!(params.device_name.as_deref(), Some("R307"));
    assert_eq!(session.state().template_count, LIBRARY_SIZE);
    assert_eq!(session.state().baud_rate, 57600);
    assert_eq!(session.state().payload_chunk_size, 128);
    assert_eq!(session.phase(), Phase::Done);
    assert!(port.is_open());
    assert_eq!(port.open_history(), &[57600]);
}

#[test]
fn test_initialize_with_wrong_password_closes_port() {
    let (mut port, _sensor) = simulated(64);
    let mut session = Session::new(&mut port).with_receiver_config(fast());

    let err = session
        .initialize(0x1234_5678, ADDRESS)
        .unwrap_err();
    assert_eq!(err.confirmation_code(), Some(ConfirmationCode::WrongPassword));
    assert_eq!(session.state().password, PASSWORD);
    assert!(!port.is_open());
    assert_eq!(port.close_calls(), 1);
}

#[test]
fn test_initialize_with_failing_port() {
    let mut port = ScriptedPort::new().failing_open();
    let mut session = Session::new(&mut port);
    let err = session
        .initialize(PASSWORD, ADDRESS)
        .unwrap_err();
    assert!(err.is_transport());
    assert!(port.written().is_empty());
    assert_eq!(port.close_calls(), 1);
}

#[test]
fn test_enroll_and_search() {
    let (mut port, sensor) = simulated(16);
    sensor.lock().unwrap().finger_present = true;

    let mut session = Session::new(&mut port).with_receiver_config(fast());
    session
        .initialize(PASSWORD, ADDRESS)
        .unwrap();

    session.capture_image().unwrap();
    session
        .image_to_character(CharBuffer::One)
        .unwrap();
    session.capture_image().unwrap();
    session
        .image_to_character(CharBuffer::Two)
        .unwrap();
    session
        .generate_template()
        .unwrap();
    session
        .save_template(CharBuffer::One, 7)
        .unwrap();

    assert_eq!(session.template_count().unwrap(), 1);
    let found = session
        .capture_and_full_search()
        .unwrap();
    assert_eq!(found.location, 7);
    assert_eq!(found.score, 180);
    assert_eq!(session.state().last_finger_id, 7);

    let sensor = sensor.lock().unwrap();
    assert!(sensor.library.contains_key(&6));
    assert_eq!(sensor.commands, vec![0x13, 0x16, 0x01, 0x02, 0x01, 0x02, 0x05, 0x06, 0x1D, 0x34]);
}

#[test]
fn test_no_finger_is_device_error() {
    let (mut port, _sensor) = simulated(64);
    let mut session = Session::new(&mut port).with_receiver_config(fast());
    let err = session
        .capture_image()
        .unwrap_err();
    assert_eq!(err.confirmation_code(), Some(ConfirmationCode::NoFinger));
    assert_eq!(session.last_confirmation_code(), ConfirmationCode::NoFinger);
    assert_eq!(session.phase(), Phase::Done);
}

#[test]
fn test_export_image_over_fragmented_reads() {
    let (mut port, sensor) = simulated(3);
    sensor.lock().unwrap().finger_present = true;

    let mut session = Session::new(&mut port).with_receiver_config(fast());
    session.capture_image().unwrap();

    let mut progress = Vec::new();
    let image = session
        .export_image_with_progress(|n| progress.push(n))
        .unwrap();
    assert_eq!(image, sensor.lock().unwrap().image);
    assert_eq!(progress.len(), 4096 / CHUNK);
    assert_eq!(progress.last(), Some(&4096));
}

#[test]
fn test_import_image_reaches_sensor() {
    let (mut port, sensor) = simulated(64);
    let mut session = Session::new(&mut port).with_receiver_config(fast());

    let image: Vec<u8> = (0..1000u32).map(|i| (i * 3) as u8).collect();
    session
        .import_image(&image)
        .unwrap();

    let sensor = sensor.lock().unwrap();
    assert!(!sensor.uploading);
    assert_eq!(sensor.uploaded, image);
}

#[test]
fn test_delete_and_clear() {
    let (mut port, sensor) = simulated(64);
    {
        let mut sensor = sensor.lock().unwrap();
        for page in 0..5 {
            sensor.library.insert(page, vec![0; 4]);
        }
    }

    let mut session = Session::new(&mut port).with_receiver_config(fast());
    session
        .initialize(PASSWORD, ADDRESS)
        .unwrap();
    session
        .delete_templates(2, 3)
        .unwrap();
    assert_eq!(session.template_count().unwrap(), 2);
    assert_eq!(
        sensor
            .lock()
            .unwrap()
            .library
            .keys()
            .copied()
            .collect::<Vec<_>>(),
        vec![0, 4]
    );

    session.clear_library().unwrap();
    assert_eq!(session.template_count().unwrap(), 0);
}

#[test]
fn test_unanswered_command_times_out_once() {
    let mut port = ScriptedPort::new();
    let mut session = Session::new(&mut port)
        .with_receiver_config(fast())
        .with_timeout(Duration::from_millis(25));
    let err = session
        .random_number()
        .unwrap_err();
    assert_eq!(err.protocol(), Some(r30x::ProtocolError::Timeout));
    assert_eq!(session.phase(), Phase::Failed);
    assert_eq!(port.written().len(), 12);
}

//! Connection challenge solver and server list decoder.

use crate::packet::CHALLENGE_FRAME_SIZE;

pub const RESPONSE_SIZE: usize = 24;

/// First challenge byte read by the solver, counted from the frame start.
const CHALLENGE_OFFSET: usize = 17;

/// Reduce into `[0, 26)`.
fn mod26(value: i32) -> i32 {
    let rem = value % 26;
    if rem < 0 {
        rem + 26
    } else {
        rem
    }
}

fn normalize(byte: u8, bias: i32) -> i32 {
    // source bytes are signed
    let mut value = byte as i8 as i32;
    if value <= 96 {
        value += 32;
    }
    mod26(value - bias)
}

/// Answer the `'6'` challenge frame.
///
/// Each response byte folds two challenge bytes into a letter and mixes in
/// a running accumulator, so bytes must be produced strictly in order.
pub fn solve(challenge: &[u8; CHALLENGE_FRAME_SIZE]) -> [u8; RESPONSE_SIZE] {
    let mut response = [0u8; RESPONSE_SIZE];
    let mut accumulator = 0i32;

    for (idx, out) in response.iter_mut().enumerate() {
        let step = idx as i32 * 34;
        let v1 = normalize(challenge[CHALLENGE_OFFSET + idx * 2], 98 + step);
        let v2 = normalize(challenge[CHALLENGE_OFFSET + 1 + idx * 2], 115 + step);

        let mut interim = (v1 << 4) | v2;
        let offset = if interim >= 97 { 97 } else { 65 };
        interim -= offset;
        if idx == 0 {
            accumulator = 2 + interim;
        }
        // truncating remainder, the sum may be negative
        *out = ((interim + accumulator) % 26 + offset) as u8;
        accumulator += 3 + interim;
    }
    response
}

/// Decode the obfuscated server list into `ip:port` strings.
///
/// Every pair of letters yields one byte; every eleven bytes describe one
/// server as four address octets and a 24-bit big-endian port.
pub fn decode_server_list(text: &str) -> Vec<String> {
    let text = text.as_bytes();
    let data_size = text.len().saturating_sub(1) / 2;
    let data: Vec<u8> = (0..data_size)
        .map(|idx| {
            let step = 14 * idx as i32;
            let u1 = mod26(text[idx * 2 + 1] as i32 - 97 - step);
            let u2 = mod26(text[idx * 2 + 2] as i32 - 104 - step);
            ((u1 << 4) + u2) as u8
        })
        .collect();

    let server_count = text.len().saturating_sub(1) / 22;
    data.chunks_exact(11)
        .take(server_count)
        .map(|server| {
            let port = ((server[4] as u32) << 16) | ((server[5] as u32) << 8) | server[6] as u32;
            format!("{}.{}.{}.{}:{}", server[0], server[1], server[2], server[3], port)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHALLENGE: &[u8] = b"6EULxUGXmjVOPVrFzNIxQdtLLTUdQjaRIZXiyPGxLhCqayOFxlkVQdcMzRNAuKaNjwVHYPpYKbqJGwmDpMyPEbvgHOCwVhBMMUKCukjVPzzHHPNCXjdrGzMhtoLxREdklvhzcLZTMbNkWpfZzHWpFvjgUJgvpzXihUr";

    const SERVER_LIST: &str = concat!(
        "amvzkluwfelsarzubipgokzhgaianpxcjqypxszgnygjpfeygylnwahownvqxel",
        "slhndcwewjlvyfmultovcjdxflbesxggupwdksjrmtahpxcszcqvfblnubiqhpk",
        "ryfmzaqxaotdzotszgofnipwdvdyovwiookisqxemdlgnubtaxfmfyjtubhovck",
        "bjelszhwudtpwmorynmtaizhcjqximsbrnuklejdkrygxfahovnoqznqvhhryji",
        "pwevdyfmtkvoyeufggqvfgnuctbwdkrjimebwahlkwxelsarzubipwjkdzuyfji",
        "udcjqypxszgncfibxswdhgsuahownvqxelblgzhclzhkszyfmultovcjrcepfaj",
        "xfiqcwdksjrmtahqdcndyhvdgosubiqhpkryfahalsxmoeckvszgofnipwdxtys",
        "xcdjudlrqxemdlgnubluwivabhsbkpovckbjelszqtugrsekmwifmtaizhcjqxs",
        "zsnoyaeqrjmkrygxfahovgpqemwycopehipwevdyfmtjjoc",
    );

    fn challenge_frame() -> [u8; CHALLENGE_FRAME_SIZE] {
        let mut frame = [0u8; CHALLENGE_FRAME_SIZE];
        frame[2..].copy_from_slice(CHALLENGE);
        frame
    }

    #[test]
    fn test_solve_known_challenge() {
        let response = solve(&challenge_frame());
        assert_eq!(&response, b"OYiNCSwCIVRXAmeclZlbwHHf");
    }

    #[test]
    fn test_solve_output_is_ascii_letters() {
        let mut frame = challenge_frame();
        for byte in frame.iter_mut().skip(17) {
            *byte = byte.wrapping_mul(7);
        }
        for byte in solve(&frame) {
            assert!(byte.is_ascii(), "byte {} out of range", byte);
        }
    }

    #[test]
    fn test_decode_server_list() {
        assert_eq!(SERVER_LIST.len(), 551);
        let servers = decode_server_list(SERVER_LIST);
        assert_eq!(servers.len(), 25);
        assert_eq!(servers[0], "206.191.155.104:444");
        assert_eq!(servers[1], "145.239.6.18:444");
        assert_eq!(servers[24], "139.99.130.166:444");
        assert!(servers.iter().all(|s| s.ends_with(":444")));
    }

    #[test]
    fn test_decode_server_list_empty() {
        assert!(decode_server_list("").is_empty());
        assert!(decode_server_list("a").is_empty());
    }
}

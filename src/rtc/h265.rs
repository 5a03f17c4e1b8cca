//! H.265/HEVC RTP payloads (RFC 7798)
//!
//! The sample-track layer has no built-in HEVC payloader, so access units
//! are packetized here: parameter sets (VPS/SPS/PPS) are cached and emitted
//! as one aggregation packet ahead of the next VCL NAL, small NALs go out
//! as single-NAL payloads, large ones are split into fragmentation units.
//!
//! NAL unit header (2 bytes): `F (1) | Type (6) | LayerId (6) | TID (3)`.
//! FU packets carry a PayloadHdr with Type=49 followed by a one-byte FU
//! header `S | E | FuType`.

use bytes::{BufMut, Bytes, BytesMut};

const NAL_VPS: u8 = 32;
const NAL_SPS: u8 = 33;
const NAL_PPS: u8 = 34;
const NAL_AUD: u8 = 35;
const NAL_FILLER: u8 = 38;
const NAL_TYPE_AP: u8 = 48;
const NAL_TYPE_FU: u8 = 49;

const NAL_HEADER_LEN: usize = 2;
const FU_HEADER_LEN: usize = 1;

/// H.265 payloader carrying parameter-set state across access units.
#[derive(Debug, Default)]
pub struct H265Payloader {
    vps: Option<Bytes>,
    sps: Option<Bytes>,
    pps: Option<Bytes>,
}

impl H265Payloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split an Annex B access unit into RTP payloads no larger than `mtu`.
    pub fn payload(&mut self, mtu: usize, access_unit: &Bytes) -> Vec<Bytes> {
        if access_unit.is_empty() || mtu <= NAL_HEADER_LEN + FU_HEADER_LEN {
            return Vec::new();
        }

        let mut out = Vec::new();
        let nals = split_annex_b(access_unit);
        if nals.is_empty() {
            // No start codes; treat the whole buffer as one NAL.
            self.emit(access_unit.clone(), mtu, &mut out);
        } else {
            for nal in nals {
                self.emit(nal, mtu, &mut out);
            }
        }
        out
    }

    fn emit(&mut self, nal: Bytes, mtu: usize, out: &mut Vec<Bytes>) {
        if nal.len() < NAL_HEADER_LEN {
            return;
        }

        match nal_type(&nal) {
            NAL_AUD | NAL_FILLER => {}
            NAL_VPS => self.vps = Some(nal),
            NAL_SPS => self.sps = Some(nal),
            NAL_PPS => self.pps = Some(nal),
            _ => {
                // Parameter sets precede the VCL NAL they describe.
                self.flush_parameter_sets(mtu, out);
                if nal.len() <= mtu {
                    out.push(nal);
                } else {
                    fragment(&nal, mtu, out);
                }
            }
        }
    }

    /// Emit cached VPS+SPS+PPS as an aggregation packet, or individually
    /// when the set does not fit the MTU. A partial set stays cached until
    /// the missing NALs arrive.
    fn flush_parameter_sets(&mut self, mtu: usize, out: &mut Vec<Bytes>) {
        let (Some(vps), Some(sps), Some(pps)) =
            (self.vps.clone(), self.sps.clone(), self.pps.clone())
        else {
            return;
        };
        self.vps = None;
        self.sps = None;
        self.pps = None;

        let ap_len = NAL_HEADER_LEN + 3 * 2 + vps.len() + sps.len() + pps.len();
        if ap_len > mtu {
            out.push(vps);
            out.push(sps);
            out.push(pps);
            return;
        }

        let mut ap = BytesMut::with_capacity(ap_len);
        // PayloadHdr: Type=48, LayerId=0, TID=1
        ap.put_u8(NAL_TYPE_AP << 1);
        ap.put_u8(0x01);
        for nal in [&vps, &sps, &pps] {
            ap.put_u16(nal.len() as u16);
            ap.put_slice(nal);
        }
        out.push(ap.freeze());
    }
}

fn nal_type(nal: &[u8]) -> u8 {
    (nal[0] >> 1) & 0x3F
}

/// Split Annex B data (3- or 4-byte start codes) into NAL units.
fn split_annex_b(data: &Bytes) -> Vec<Bytes> {
    // (code_start, body_start) per start code; a NAL runs from its
    // body_start to the next code_start.
    let mut marks = Vec::new();
    let mut zeros = 0usize;
    for (i, &b) in data.iter().enumerate() {
        if b == 0 {
            zeros += 1;
            continue;
        }
        if b == 1 && zeros >= 2 {
            marks.push((i - zeros, i + 1));
        }
        zeros = 0;
    }

    let mut nals = Vec::with_capacity(marks.len());
    for (idx, &(_, body_start)) in marks.iter().enumerate() {
        let end = marks
            .get(idx + 1)
            .map_or(data.len(), |&(code_start, _)| code_start);
        if body_start < end {
            nals.push(data.slice(body_start..end));
        }
    }
    nals
}

/// Split one NAL into FU packets.
fn fragment(nal: &Bytes, mtu: usize, out: &mut Vec<Bytes>) {
    let fu_type = nal_type(nal);
    let body = &nal[NAL_HEADER_LEN..];
    let max_chunk = mtu - NAL_HEADER_LEN - FU_HEADER_LEN;
    if body.is_empty() || max_chunk == 0 {
        return;
    }

    // PayloadHdr keeps the F bit and layer/TID bits of the original NAL.
    let hdr0 = (nal[0] & 0b1000_0001) | (NAL_TYPE_FU << 1);
    let hdr1 = nal[1];

    let mut offset = 0usize;
    while offset < body.len() {
        let chunk = (body.len() - offset).min(max_chunk);
        let mut pkt = BytesMut::with_capacity(NAL_HEADER_LEN + FU_HEADER_LEN + chunk);
        pkt.put_u8(hdr0);
        pkt.put_u8(hdr1);

        let mut fu = fu_type;
        if offset == 0 {
            fu |= 0x80; // S
        }
        if offset + chunk == body.len() {
            fu |= 0x40; // E
        }
        pkt.put_u8(fu);
        pkt.put_slice(&body[offset..offset + chunk]);
        out.push(pkt.freeze());
        offset += chunk;
    }
}

//! WDC 65C02 core.
//!
//! Instruction level, not cycle level: each `step` does all of an
//! instruction's bus traffic at once and reports the cycle count from the
//! datasheet. Only the accesses the instruction semantically needs reach the
//! bus. There are no dummy reads, because reading an I/O register (the ACIA
//! data or status register, say) has side effects.
use crate::bus::Bus;
use crate::cpu::Cpu;

pub const FLAG_C: u8 = 0x01;
pub const FLAG_Z: u8 = 0x02;
pub const FLAG_I: u8 = 0x04;
pub const FLAG_D: u8 = 0x08;
pub const FLAG_B: u8 = 0x10;
pub const FLAG_U: u8 = 0x20;
pub const FLAG_V: u8 = 0x40;
pub const FLAG_N: u8 = 0x80;

const RESET_VECTOR: u16 = 0xfffc;
const IRQ_VECTOR: u16 = 0xfffe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    /// (abs), JMP only
    Indirect,
    /// (zp,X)
    IndexedIndirect,
    /// (zp),Y
    IndirectIndexed,
    /// (zp)
    ZeroPageIndirect,
    /// (abs,X), JMP only
    AbsoluteIndexedIndirect,
    Relative,
    /// zp then relative, BBR/BBS only
    ZeroPageRelative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Adc,
    And,
    Asl,
    Bbr(u8),
    Bbs(u8),
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Bra,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Phx,
    Phy,
    Pla,
    Plp,
    Plx,
    Ply,
    Rmb(u8),
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Smb(u8),
    Sta,
    Stp,
    Stx,
    Sty,
    Stz,
    Tax,
    Tay,
    Trb,
    Tsb,
    Tsx,
    Txa,
    Txs,
    Tya,
    Wai,
}

use Mode::*;
use Op::*;

/// The opcode matrix: operation, addressing mode and base cycle count.
fn decode(opcode: u8) -> (Op, Mode, u32) {
    // the regular ALU group: aaabbb01
    const ALU: [Op; 8] = [Ora, And, Eor, Adc, Sta, Lda, Cmp, Sbc];
    const ALU_MODES: [(Mode, u32); 8] = [
        (IndexedIndirect, 6),
        (ZeroPage, 3),
        (Immediate, 2),
        (Absolute, 4),
        (IndirectIndexed, 5),
        (ZeroPageX, 4),
        (AbsoluteY, 4),
        (AbsoluteX, 4),
    ];

    match opcode {
        0x89 => (Bit, Immediate, 2),
        // stores can't skip the index fixup cycle
        0x91 => (Sta, IndirectIndexed, 6),
        0x99 => (Sta, AbsoluteY, 5),
        0x9d => (Sta, AbsoluteX, 5),
        op if op & 0x03 == 0x01 => {
            let (mode, cycles) = ALU_MODES[usize::from((op >> 2) & 0x07)];
            (ALU[usize::from(op >> 5)], mode, cycles)
        }
        op if op & 0x1f == 0x12 => (ALU[usize::from(op >> 5)], ZeroPageIndirect, 5),
        op if op & 0x0f == 0x07 => match op >> 4 {
            bit @ 0..=7 => (Rmb(bit), ZeroPage, 5),
            bit => (Smb(bit - 8), ZeroPage, 5),
        },
        op if op & 0x0f == 0x0f => match op >> 4 {
            bit @ 0..=7 => (Bbr(bit), ZeroPageRelative, 5),
            bit => (Bbs(bit - 8), ZeroPageRelative, 5),
        },
        0xcb => (Wai, Implied, 3),
        0xdb => (Stp, Implied, 3),
        // every other x3 and xB is a one byte, one cycle no-op
        op if op & 0x07 == 0x03 => (Nop, Implied, 1),

        0x00 => (Brk, Implied, 7),
        0x04 => (Tsb, ZeroPage, 5),
        0x06 => (Asl, ZeroPage, 5),
        0x08 => (Php, Implied, 3),
        0x0a => (Asl, Accumulator, 2),
        0x0c => (Tsb, Absolute, 6),
        0x0e => (Asl, Absolute, 6),
        0x10 => (Bpl, Relative, 2),
        0x14 => (Trb, ZeroPage, 5),
        0x16 => (Asl, ZeroPageX, 6),
        0x18 => (Clc, Implied, 2),
        0x1a => (Inc, Accumulator, 2),
        0x1c => (Trb, Absolute, 6),
        0x1e => (Asl, AbsoluteX, 6),

        0x20 => (Jsr, Absolute, 6),
        0x24 => (Bit, ZeroPage, 3),
        0x26 => (Rol, ZeroPage, 5),
        0x28 => (Plp, Implied, 4),
        0x2a => (Rol, Accumulator, 2),
        0x2c => (Bit, Absolute, 4),
        0x2e => (Rol, Absolute, 6),
        0x30 => (Bmi, Relative, 2),
        0x34 => (Bit, ZeroPageX, 4),
        0x36 => (Rol, ZeroPageX, 6),
        0x38 => (Sec, Implied, 2),
        0x3a => (Dec, Accumulator, 2),
        0x3c => (Bit, AbsoluteX, 4),
        0x3e => (Rol, AbsoluteX, 6),

        0x40 => (Rti, Implied, 6),
        0x46 => (Lsr, ZeroPage, 5),
        0x48 => (Pha, Implied, 3),
        0x4a => (Lsr, Accumulator, 2),
        0x4c => (Jmp, Absolute, 3),
        0x4e => (Lsr, Absolute, 6),
        0x50 => (Bvc, Relative, 2),
        0x56 => (Lsr, ZeroPageX, 6),
        0x58 => (Cli, Implied, 2),
        0x5a => (Phy, Implied, 3),
        0x5c => (Nop, Absolute, 8),
        0x5e => (Lsr, AbsoluteX, 6),

        0x60 => (Rts, Implied, 6),
        0x64 => (Stz, ZeroPage, 3),
        0x66 => (Ror, ZeroPage, 5),
        0x68 => (Pla, Implied, 4),
        0x6a => (Ror, Accumulator, 2),
        0x6c => (Jmp, Indirect, 6),
        0x6e => (Ror, Absolute, 6),
        0x70 => (Bvs, Relative, 2),
        0x74 => (Stz, ZeroPageX, 4),
        0x76 => (Ror, ZeroPageX, 6),
        0x78 => (Sei, Implied, 2),
        0x7a => (Ply, Implied, 4),
        0x7c => (Jmp, AbsoluteIndexedIndirect, 6),
        0x7e => (Ror, AbsoluteX, 6),

        0x80 => (Bra, Relative, 2),
        0x84 => (Sty, ZeroPage, 3),
        0x86 => (Stx, ZeroPage, 3),
        0x88 => (Dey, Implied, 2),
        0x8a => (Txa, Implied, 2),
        0x8c => (Sty, Absolute, 4),
        0x8e => (Stx, Absolute, 4),
        0x90 => (Bcc, Relative, 2),
        0x94 => (Sty, ZeroPageX, 4),
        0x96 => (Stx, ZeroPageY, 4),
        0x98 => (Tya, Implied, 2),
        0x9a => (Txs, Implied, 2),
        0x9c => (Stz, Absolute, 4),
        0x9e => (Stz, AbsoluteX, 5),

        0xa0 => (Ldy, Immediate, 2),
        0xa2 => (Ldx, Immediate, 2),
        0xa4 => (Ldy, ZeroPage, 3),
        0xa6 => (Ldx, ZeroPage, 3),
        0xa8 => (Tay, Implied, 2),
        0xaa => (Tax, Implied, 2),
        0xac => (Ldy, Absolute, 4),
        0xae => (Ldx, Absolute, 4),
        0xb0 => (Bcs, Relative, 2),
        0xb4 => (Ldy, ZeroPageX, 4),
        0xb6 => (Ldx, ZeroPageY, 4),
        0xb8 => (Clv, Implied, 2),
        0xba => (Tsx, Implied, 2),
        0xbc => (Ldy, AbsoluteX, 4),
        0xbe => (Ldx, AbsoluteY, 4),

        0xc0 => (Cpy, Immediate, 2),
        0xc4 => (Cpy, ZeroPage, 3),
        0xc6 => (Dec, ZeroPage, 5),
        0xc8 => (Iny, Implied, 2),
        0xca => (Dex, Implied, 2),
        0xcc => (Cpy, Absolute, 4),
        0xce => (Dec, Absolute, 6),
        0xd0 => (Bne, Relative, 2),
        0xd6 => (Dec, ZeroPageX, 6),
        0xd8 => (Cld, Implied, 2),
        0xda => (Phx, Implied, 3),
        0xde => (Dec, AbsoluteX, 7),

        0xe0 => (Cpx, Immediate, 2),
        0xe4 => (Cpx, ZeroPage, 3),
        0xe6 => (Inc, ZeroPage, 5),
        0xe8 => (Inx, Implied, 2),
        0xea => (Nop, Implied, 2),
        0xec => (Cpx, Absolute, 4),
        0xee => (Inc, Absolute, 6),
        0xf0 => (Beq, Relative, 2),
        0xf6 => (Inc, ZeroPageX, 6),
        0xf8 => (Sed, Implied, 2),
        0xfa => (Plx, Implied, 4),
        0xfe => (Inc, AbsoluteX, 7),

        // reserved: x2 take an immediate, x4 zero page (,X), xC absolute
        op if op & 0x0f == 0x02 => (Nop, Immediate, 2),
        0x44 => (Nop, ZeroPage, 3),
        op if op & 0x0f == 0x04 => (Nop, ZeroPageX, 4),
        _ => (Nop, Absolute, 4),
    }
}

/// where an instruction's operand lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    None,
    Accumulator,
    Value(u8),
    Address(u16),
}

pub struct W65C02 {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub p: u8,
    waiting: bool,
    stopped: bool,
}

impl Default for W65C02 {
    fn default() -> Self {
        Self::new()
    }
}

impl W65C02 {
    pub fn new() -> Self {
        W65C02 {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xfd,
            pc: 0,
            p: FLAG_U | FLAG_I,
            waiting: false,
            stopped: false,
        }
    }

    pub fn flag(&self, flag: u8) -> bool {
        self.p & flag != 0
    }

    fn set_flag(&mut self, flag: u8, on: bool) {
        if on {
            self.p |= flag;
        } else {
            self.p &= !flag;
        }
    }

    fn set_zn(&mut self, value: u8) {
        self.set_flag(FLAG_Z, value == 0);
        self.set_flag(FLAG_N, value & 0x80 != 0);
    }

    /// halted by STP; only reset restarts it
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// parked by WAI until the IRQ line goes up
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    fn fetch(&mut self, bus: &mut dyn Bus) -> u8 {
        let value = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn fetch_word(&mut self, bus: &mut dyn Bus) -> u16 {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn read_word(bus: &mut dyn Bus, addr: u16) -> u16 {
        u16::from_le_bytes([bus.read(addr), bus.read(addr.wrapping_add(1))])
    }

    /// pointer fetch that wraps within zero page
    fn read_zp_word(bus: &mut dyn Bus, zp: u8) -> u16 {
        u16::from_le_bytes([bus.read(u16::from(zp)), bus.read(u16::from(zp.wrapping_add(1)))])
    }

    fn push(&mut self, bus: &mut dyn Bus, value: u8) {
        bus.write(0x0100 | u16::from(self.sp), value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pull(&mut self, bus: &mut dyn Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x0100 | u16::from(self.sp))
    }

    fn push_word(&mut self, bus: &mut dyn Bus, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push(bus, hi);
        self.push(bus, lo);
    }

    fn pull_word(&mut self, bus: &mut dyn Bus) -> u16 {
        let lo = self.pull(bus);
        let hi = self.pull(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Work out the operand; returns it and whether indexing crossed a page.
    fn operand(&mut self, bus: &mut dyn Bus, mode: Mode) -> (Operand, bool) {
        let indexed = |base: u16, index: u8| {
            let addr = base.wrapping_add(u16::from(index));
            (Operand::Address(addr), base & 0xff00 != addr & 0xff00)
        };
        match mode {
            Implied => (Operand::None, false),
            Accumulator => (Operand::Accumulator, false),
            Immediate | Relative => (Operand::Value(self.fetch(bus)), false),
            ZeroPage => (Operand::Address(u16::from(self.fetch(bus))), false),
            ZeroPageX => {
                let zp = self.fetch(bus).wrapping_add(self.x);
                (Operand::Address(u16::from(zp)), false)
            }
            ZeroPageY => {
                let zp = self.fetch(bus).wrapping_add(self.y);
                (Operand::Address(u16::from(zp)), false)
            }
            Absolute => (Operand::Address(self.fetch_word(bus)), false),
            AbsoluteX => {
                let base = self.fetch_word(bus);
                indexed(base, self.x)
            }
            AbsoluteY => {
                let base = self.fetch_word(bus);
                indexed(base, self.y)
            }
            Indirect => {
                // no page wrap bug on the 65C02
                let ptr = self.fetch_word(bus);
                (Operand::Address(Self::read_word(bus, ptr)), false)
            }
            IndexedIndirect => {
                let zp = self.fetch(bus).wrapping_add(self.x);
                (Operand::Address(Self::read_zp_word(bus, zp)), false)
            }
            IndirectIndexed => {
                let zp = self.fetch(bus);
                let base = Self::read_zp_word(bus, zp);
                indexed(base, self.y)
            }
            ZeroPageIndirect => {
                let zp = self.fetch(bus);
                (Operand::Address(Self::read_zp_word(bus, zp)), false)
            }
            AbsoluteIndexedIndirect => {
                let ptr = self.fetch_word(bus).wrapping_add(u16::from(self.x));
                (Operand::Address(Self::read_word(bus, ptr)), false)
            }
            // BBR/BBS fetch their own two operand bytes
            ZeroPageRelative => (Operand::None, false),
        }
    }

    fn load(&mut self, bus: &mut dyn Bus, operand: Operand) -> u8 {
        match operand {
            Operand::Value(v) => v,
            Operand::Address(addr) => bus.read(addr),
            Operand::Accumulator => self.a,
            Operand::None => 0,
        }
    }

    fn store(&mut self, bus: &mut dyn Bus, operand: Operand, value: u8) {
        match operand {
            Operand::Address(addr) => bus.write(addr, value),
            Operand::Accumulator => self.a = value,
            _ => {}
        }
    }

    /// read-modify-write on memory or the accumulator
    fn modify(&mut self, bus: &mut dyn Bus, operand: Operand, f: impl FnOnce(&mut Self, u8) -> u8) {
        let value = self.load(bus, operand);
        let result = f(self, value);
        self.store(bus, operand, result);
    }

    /// take the branch if `cond`; returns the extra cycles
    fn branch(&mut self, offset: u8, cond: bool) -> u32 {
        if !cond {
            return 0;
        }
        let target = self.pc.wrapping_add(offset as i8 as u16);
        let crossed = target & 0xff00 != self.pc & 0xff00;
        self.pc = target;
        if crossed {
            2
        } else {
            1
        }
    }

    fn adc(&mut self, value: u8) -> u32 {
        let a = u16::from(self.a);
        let v = u16::from(value);
        let c = u16::from(self.flag(FLAG_C));
        if !self.flag(FLAG_D) {
            let sum = a + v + c;
            let result = sum as u8;
            self.set_flag(FLAG_C, sum > 0xff);
            self.set_flag(FLAG_V, (self.a ^ result) & (value ^ result) & 0x80 != 0);
            self.a = result;
            self.set_zn(result);
            return 0;
        }
        let mut lo = (a & 0x0f) + (v & 0x0f) + c;
        if lo > 0x09 {
            lo += 0x06;
        }
        let mut sum = (a & 0xf0) + (v & 0xf0) + if lo > 0x0f { 0x10 } else { 0 } + (lo & 0x0f);
        self.set_flag(FLAG_V, !(a ^ v) & (a ^ sum) & 0x80 != 0);
        if sum > 0x9f {
            sum += 0x60;
        }
        self.set_flag(FLAG_C, sum > 0xff);
        self.a = sum as u8;
        self.set_zn(self.a);
        // decimal mode costs a cycle on the 65C02, which fixes up N and Z
        1
    }

    fn sbc(&mut self, value: u8) -> u32 {
        if !self.flag(FLAG_D) {
            return self.adc(!value);
        }
        let a = i16::from(self.a);
        let v = i16::from(value);
        let borrow = i16::from(!self.flag(FLAG_C));
        let binary = a - v - borrow;
        self.set_flag(FLAG_C, binary >= 0);
        self.set_flag(FLAG_V, (a ^ v) & (a ^ binary) & 0x80 != 0);
        let lo = (a & 0x0f) - (v & 0x0f) - borrow;
        let mut result = binary;
        if result < 0 {
            result -= 0x60;
        }
        if lo < 0 {
            result -= 0x06;
        }
        self.a = result as u8;
        self.set_zn(self.a);
        1
    }

    fn compare(&mut self, reg: u8, value: u8) {
        self.set_flag(FLAG_C, reg >= value);
        self.set_zn(reg.wrapping_sub(value));
    }

    fn interrupt(&mut self, bus: &mut dyn Bus, return_to: u16, brk: bool) {
        self.push_word(bus, return_to);
        let pushed = if brk { self.p | FLAG_B | FLAG_U } else { (self.p | FLAG_U) & !FLAG_B };
        self.push(bus, pushed);
        self.set_flag(FLAG_I, true);
        self.set_flag(FLAG_D, false);
        self.pc = Self::read_word(bus, IRQ_VECTOR);
    }

    fn execute(&mut self, bus: &mut dyn Bus, op: Op, mode: Mode) -> u32 {
        let (operand, crossed) = self.operand(bus, mode);
        let page_penalty = u32::from(crossed);
        match op {
            Lda => {
                self.a = self.load(bus, operand);
                self.set_zn(self.a);
                page_penalty
            }
            Ldx => {
                self.x = self.load(bus, operand);
                self.set_zn(self.x);
                page_penalty
            }
            Ldy => {
                self.y = self.load(bus, operand);
                self.set_zn(self.y);
                page_penalty
            }
            Sta => {
                self.store(bus, operand, self.a);
                0
            }
            Stx => {
                self.store(bus, operand, self.x);
                0
            }
            Sty => {
                self.store(bus, operand, self.y);
                0
            }
            Stz => {
                self.store(bus, operand, 0);
                0
            }
            Ora => {
                self.a |= self.load(bus, operand);
                self.set_zn(self.a);
                page_penalty
            }
            And => {
                self.a &= self.load(bus, operand);
                self.set_zn(self.a);
                page_penalty
            }
            Eor => {
                self.a ^= self.load(bus, operand);
                self.set_zn(self.a);
                page_penalty
            }
            Adc => {
                let v = self.load(bus, operand);
                page_penalty + self.adc(v)
            }
            Sbc => {
                let v = self.load(bus, operand);
                page_penalty + self.sbc(v)
            }
            Cmp => {
                let v = self.load(bus, operand);
                self.compare(self.a, v);
                page_penalty
            }
            Cpx => {
                let v = self.load(bus, operand);
                self.compare(self.x, v);
                0
            }
            Cpy => {
                let v = self.load(bus, operand);
                self.compare(self.y, v);
                0
            }
            Bit => {
                let v = self.load(bus, operand);
                self.set_flag(FLAG_Z, self.a & v == 0);
                // the immediate form only touches Z
                if mode != Immediate {
                    self.set_flag(FLAG_N, v & 0x80 != 0);
                    self.set_flag(FLAG_V, v & 0x40 != 0);
                }
                page_penalty
            }
            Asl => {
                self.modify(bus, operand, |cpu, v| {
                    cpu.set_flag(FLAG_C, v & 0x80 != 0);
                    let r = v << 1;
                    cpu.set_zn(r);
                    r
                });
                page_penalty
            }
            Lsr => {
                self.modify(bus, operand, |cpu, v| {
                    cpu.set_flag(FLAG_C, v & 0x01 != 0);
                    let r = v >> 1;
                    cpu.set_zn(r);
                    r
                });
                page_penalty
            }
            Rol => {
                self.modify(bus, operand, |cpu, v| {
                    let r = (v << 1) | u8::from(cpu.flag(FLAG_C));
                    cpu.set_flag(FLAG_C, v & 0x80 != 0);
                    cpu.set_zn(r);
                    r
                });
                page_penalty
            }
            Ror => {
                self.modify(bus, operand, |cpu, v| {
                    let r = (v >> 1) | if cpu.flag(FLAG_C) { 0x80 } else { 0 };
                    cpu.set_flag(FLAG_C, v & 0x01 != 0);
                    cpu.set_zn(r);
                    r
                });
                page_penalty
            }
            Inc => {
                self.modify(bus, operand, |cpu, v| {
                    let r = v.wrapping_add(1);
                    cpu.set_zn(r);
                    r
                });
                0
            }
            Dec => {
                self.modify(bus, operand, |cpu, v| {
                    let r = v.wrapping_sub(1);
                    cpu.set_zn(r);
                    r
                });
                0
            }
            Tsb => {
                self.modify(bus, operand, |cpu, v| {
                    cpu.set_flag(FLAG_Z, cpu.a & v == 0);
                    v | cpu.a
                });
                0
            }
            Trb => {
                self.modify(bus, operand, |cpu, v| {
                    cpu.set_flag(FLAG_Z, cpu.a & v == 0);
                    v & !cpu.a
                });
                0
            }
            Rmb(bit) => {
                self.modify(bus, operand, |_, v| v & !(1 << bit));
                0
            }
            Smb(bit) => {
                self.modify(bus, operand, |_, v| v | (1 << bit));
                0
            }
            Bbr(bit) | Bbs(bit) => {
                let zp = self.fetch(bus);
                let offset = self.fetch(bus);
                let value = bus.read(u16::from(zp));
                let set = value & (1 << bit) != 0;
                self.branch(offset, set == matches!(op, Bbs(_)))
            }
            Inx => {
                self.x = self.x.wrapping_add(1);
                self.set_zn(self.x);
                0
            }
            Iny => {
                self.y = self.y.wrapping_add(1);
                self.set_zn(self.y);
                0
            }
            Dex => {
                self.x = self.x.wrapping_sub(1);
                self.set_zn(self.x);
                0
            }
            Dey => {
                self.y = self.y.wrapping_sub(1);
                self.set_zn(self.y);
                0
            }
            Tax => {
                self.x = self.a;
                self.set_zn(self.x);
                0
            }
            Tay => {
                self.y = self.a;
                self.set_zn(self.y);
                0
            }
            Txa => {
                self.a = self.x;
                self.set_zn(self.a);
                0
            }
            Tya => {
                self.a = self.y;
                self.set_zn(self.a);
                0
            }
            Tsx => {
                self.x = self.sp;
                self.set_zn(self.x);
                0
            }
            Txs => {
                self.sp = self.x;
                0
            }
            Pha => {
                self.push(bus, self.a);
                0
            }
            Phx => {
                self.push(bus, self.x);
                0
            }
            Phy => {
                self.push(bus, self.y);
                0
            }
            Php => {
                self.push(bus, self.p | FLAG_B | FLAG_U);
                0
            }
            Pla => {
                self.a = self.pull(bus);
                self.set_zn(self.a);
                0
            }
            Plx => {
                self.x = self.pull(bus);
                self.set_zn(self.x);
                0
            }
            Ply => {
                self.y = self.pull(bus);
                self.set_zn(self.y);
                0
            }
            Plp => {
                self.p = (self.pull(bus) | FLAG_U) & !FLAG_B;
                0
            }
            Clc => {
                self.set_flag(FLAG_C, false);
                0
            }
            Sec => {
                self.set_flag(FLAG_C, true);
                0
            }
            Cli => {
                self.set_flag(FLAG_I, false);
                0
            }
            Sei => {
                self.set_flag(FLAG_I, true);
                0
            }
            Cld => {
                self.set_flag(FLAG_D, false);
                0
            }
            Sed => {
                self.set_flag(FLAG_D, true);
                0
            }
            Clv => {
                self.set_flag(FLAG_V, false);
                0
            }
            Bpl | Bmi | Bvc | Bvs | Bcc | Bcs | Bne | Beq | Bra => {
                let offset = match operand {
                    Operand::Value(v) => v,
                    _ => 0,
                };
                let cond = match op {
                    Bpl => !self.flag(FLAG_N),
                    Bmi => self.flag(FLAG_N),
                    Bvc => !self.flag(FLAG_V),
                    Bvs => self.flag(FLAG_V),
                    Bcc => !self.flag(FLAG_C),
                    Bcs => self.flag(FLAG_C),
                    Bne => !self.flag(FLAG_Z),
                    Beq => self.flag(FLAG_Z),
                    _ => true,
                };
                self.branch(offset, cond)
            }
            Jmp => {
                if let Operand::Address(addr) = operand {
                    self.pc = addr;
                }
                0
            }
            Jsr => {
                // pushes the address of the last operand byte
                if let Operand::Address(addr) = operand {
                    self.push_word(bus, self.pc.wrapping_sub(1));
                    self.pc = addr;
                }
                0
            }
            Rts => {
                self.pc = self.pull_word(bus).wrapping_add(1);
                0
            }
            Rti => {
                self.p = (self.pull(bus) | FLAG_U) & !FLAG_B;
                self.pc = self.pull_word(bus);
                0
            }
            Brk => {
                // skips the signature byte
                self.interrupt(bus, self.pc.wrapping_add(1), true);
                0
            }
            Wai => {
                self.waiting = true;
                0
            }
            Stp => {
                self.stopped = true;
                0
            }
            Nop => 0,
        }
    }
}

impl Cpu for W65C02 {
    fn reset(&mut self, bus: &mut dyn Bus) {
        self.sp = 0xfd;
        self.p = FLAG_U | FLAG_I;
        self.waiting = false;
        self.stopped = false;
        self.pc = Self::read_word(bus, RESET_VECTOR);
    }

    fn step(&mut self, bus: &mut dyn Bus, irq: bool) -> u32 {
        if self.stopped {
            return 1;
        }
        if self.waiting {
            if !irq {
                return 1;
            }
            // WAI with interrupts masked just resumes at the next instruction
            self.waiting = false;
        }
        if irq && !self.flag(FLAG_I) {
            self.interrupt(bus, self.pc, false);
            return 7;
        }
        let opcode = self.fetch(bus);
        let (op, mode, cycles) = decode(opcode);
        cycles + self.execute(bus, op, mode)
    }

    fn pc(&self) -> u16 {
        self.pc
    }
}

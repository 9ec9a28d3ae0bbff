// Color literal parser: #rrggbb, #rgb, rgb(r, g, b), rgba(r, g, b, a), names

use super::lexer::{number_literal, ws};
use crate::palette::Color;
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while_m_n},
    character::complete::{alpha1, char},
    combinator::{all_consuming, map, map_opt, map_res},
    sequence::{preceded, tuple},
    IResult,
};

const WHITE: Color = Color::new(255, 255, 255);

fn hex_pair(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), |s: &str| {
        u8::from_str_radix(s, 16)
    })(input)
}

fn hex_single(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(1, 1, |c: char| c.is_ascii_hexdigit()), |s: &str| {
        u8::from_str_radix(s, 16).map(|v| v * 17)
    })(input)
}

fn hex_color(input: &str) -> IResult<&str, Color> {
    preceded(
        char('#'),
        alt((
            map(tuple((hex_pair, hex_pair, hex_pair)), |(r, g, b)| {
                Color::new(r, g, b)
            }),
            map(tuple((hex_single, hex_single, hex_single)), |(r, g, b)| {
                Color::new(r, g, b)
            }),
        )),
    )(input)
}

fn channel(input: &str) -> IResult<&str, u8> {
    map_opt(ws(number_literal), |v| {
        (0.0..=255.0).contains(&v).then(|| v.round() as u8)
    })(input)
}

fn alpha(input: &str) -> IResult<&str, f64> {
    map_opt(ws(number_literal), |v| (0.0..=1.0).contains(&v).then_some(v))(input)
}

fn rgb_color(input: &str) -> IResult<&str, Color> {
    let (input, _) = ws(tag_no_case("rgb"))(input)?;
    let (input, _) = ws(char('('))(input)?;
    let (input, (r, _, g, _, b)) = tuple((channel, char(','), channel, char(','), channel))(input)?;
    let (input, _) = ws(char(')'))(input)?;
    Ok((input, Color::new(r, g, b)))
}

/// `rgba(...)` is flattened by compositing over a white background.
fn rgba_color(input: &str) -> IResult<&str, Color> {
    let (input, _) = ws(tag_no_case("rgba"))(input)?;
    let (input, _) = ws(char('('))(input)?;
    let (input, (r, _, g, _, b, _, a)) = tuple((
        channel,
        char(','),
        channel,
        char(','),
        channel,
        char(','),
        alpha,
    ))(input)?;
    let (input, _) = ws(char(')'))(input)?;
    Ok((input, WHITE.lerp(Color::new(r, g, b), a)))
}

fn named_color(input: &str) -> IResult<&str, Color> {
    map_opt(ws(alpha1), |name: &str| match name.to_ascii_lowercase().as_str() {
        "red" => Some(Color::new(255, 0, 0)),
        "green" => Some(Color::new(0, 128, 0)),
        "blue" => Some(Color::new(0, 0, 255)),
        "black" => Some(Color::new(0, 0, 0)),
        "white" => Some(WHITE),
        "yellow" => Some(Color::new(255, 255, 0)),
        "orange" => Some(Color::new(255, 165, 0)),
        "cyan" => Some(Color::new(0, 255, 255)),
        "magenta" => Some(Color::new(255, 0, 255)),
        "gray" | "grey" => Some(Color::new(128, 128, 128)),
        "lightgray" | "lightgrey" => Some(Color::new(211, 211, 211)),
        "steelblue" => Some(Color::new(70, 130, 180)),
        _ => None,
    })(input)
}

/// Parse a complete color literal
pub fn parse_color(input: &str) -> IResult<&str, Color> {
    all_consuming(ws(alt((hex_color, rgba_color, rgb_color, named_color))))(input)
}

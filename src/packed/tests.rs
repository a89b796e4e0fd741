use super::*;
use crate::types::{Address, Hash, Signature, U256};
use serde::Serialize;
use uint::hex::FromHex;

/// Compare the packed encoding of `value` against hex, ignoring whitespace so
/// the expected output can be split into one line per field.
fn serialize_and_compare<T: Serialize>(value: &T, expected: &str) {
    let expected: String = expected.split_whitespace().collect();
    let expected = Vec::<u8>::from_hex(expected).unwrap();
    assert_eq!(to_vec(value).unwrap(), expected);
}

#[test]
fn integers_keep_natural_width() {
    /*
    ```solidity
    abi.encodePacked(uint8(0x12), uint16(0x3456), uint64(0x1337000012341111), true)
    ```
    */
    serialize_and_compare(
        &(0x12u8, 0x3456u16, 0x1337000012341111u64, true),
        "12 3456 1337000012341111 01",
    );
}

#[test]
fn negative_integers_are_twos_complement() {
    serialize_and_compare(&(-1i8, -2i32), "ff fffffffe");
}

#[test]
fn u256_is_32_bytes() {
    serialize_and_compare(
        &U256::from(0x2222),
        "0000000000000000000000000000000000000000000000000000000000002222",
    );
}

#[test]
fn struct_is_concatenation() {
    /*
    ```solidity
    abi.encodePacked(
        address(0x5B38Da6a701c568545dCfcB03FcB875f56beddC4),
        uint256(5),
        bytes32(0x0202...02)
    )
    ```
    */
    #[derive(Serialize)]
    struct Message {
        sender: Address,
        amount: U256,
        data: Hash,
    }

    let d = Message {
        sender: "0x5B38Da6a701c568545dCfcB03FcB875f56beddC4".parse().unwrap(),
        amount: 5.into(),
        data: Hash([0x02; 32]),
    };

    let expected = "
        5b38da6a701c568545dcfcb03fcb875f56beddc4
        0000000000000000000000000000000000000000000000000000000000000005
        0202020202020202020202020202020202020202020202020202020202020202
    ";
    serialize_and_compare(&d, expected);
}

#[test]
fn signature_is_raw_65_bytes() {
    let mut sig = Signature([0x11; 65]);
    sig.0[64] = 0x1b;
    assert_eq!(to_vec(&sig).unwrap().len(), 65);
    assert_eq!(to_vec(&sig).unwrap()[64], 0x1b);
}

#[test]
fn strings_and_bytes_are_raw() {
    serialize_and_compare(&("ab", [0xa1u8, 0xa2]), "6162 a1a2");
}

#[test]
fn unrepresentable_types() {
    assert_eq!(to_vec(&1.5f64), Err(Error::TypeNotRepresentable("f64")));
    assert_eq!(to_vec(&vec![1u8, 2]), Err(Error::TypeNotRepresentable("sequence")));
    assert_eq!(to_vec(&None::<u8>), Err(Error::TypeNotRepresentable("none")));
}

#[test]
fn keccak_of_empty_input() {
    let expected = Hash(
        <[u8; 32]>::from_hex("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
            .unwrap(),
    );
    assert_eq!(to_hash(&()).unwrap(), expected);
}

#[test]
fn keccak_of_zero_word() {
    // keccak256(abi.encodePacked(uint256(0)))
    let expected = Hash(
        <[u8; 32]>::from_hex("290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563")
            .unwrap(),
    );
    assert_eq!(to_hash(&U256::zero()).unwrap(), expected);
}
